use std::time::Duration;

use tokio::time::Instant;

use super::change::TriggerKind;

/// Outcome of feeding a trigger to the coalescer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Coalesced {
    /// Burst opened or extended; a fire attempt is due at [`SaveCoalescer::deadline`].
    Scheduled,
    /// Manual triggers flush immediately, absorbing any pending burst.
    FireNow,
}

/// Trailing-edge debounce with a hard ceiling, kept as two explicit bounds:
/// the window moves with every trigger, the ceiling is pinned to the first
/// trigger of the burst so a continuous stream cannot starve saving.
#[derive(Debug, Clone)]
pub(crate) struct SaveCoalescer {
    window: Duration,
    ceiling: Duration,
    burst: Option<Burst>,
}

#[derive(Debug, Clone, Copy)]
struct Burst {
    first_at: Instant,
    deadline: Instant,
}

impl SaveCoalescer {
    pub fn new(window: Duration, ceiling: Duration) -> Self {
        Self {
            window,
            ceiling,
            burst: None,
        }
    }

    pub fn note(&mut self, kind: TriggerKind, now: Instant) -> Coalesced {
        if kind == TriggerKind::Manual {
            self.burst = None;
            return Coalesced::FireNow;
        }
        let burst = match self.burst {
            Some(burst) => Burst {
                first_at: burst.first_at,
                deadline: (now + self.window).min(burst.first_at + self.ceiling),
            },
            None => Burst {
                first_at: now,
                deadline: now + self.window,
            },
        };
        self.burst = Some(burst);
        Coalesced::Scheduled
    }

    /// Deadline of the pending burst, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.burst.map(|burst| burst.deadline)
    }

    /// Push the pending fire attempt out, e.g. until the user settles.
    pub fn defer_until(&mut self, deadline: Instant) {
        if let Some(burst) = &mut self.burst {
            burst.deadline = deadline;
        }
    }

    /// Consume the pending burst once its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.burst {
            Some(burst) if burst.deadline <= now => {
                self.burst = None;
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.burst = None;
    }
}
