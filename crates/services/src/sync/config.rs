use std::time::Duration;

/// Timing policy for the sync engine.
///
/// Defaults match production behaviour; tests shrink individual knobs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Period of the recurring auto-save tick. The next tick is armed only
    /// after the previous tick's work finishes, never at a fixed rate.
    pub auto_save_period: Duration,
    /// How long the user must be idle on the current state before an
    /// automatic save may run.
    pub settle_threshold: Duration,
    /// Minimum gap between automatic saves, measured from the last
    /// successful save.
    pub auto_save_min_interval: Duration,
    /// Minimum gap between manual save attempts; absorbs accidental
    /// double-activation.
    pub manual_min_interval: Duration,
    /// Trailing debounce window for a burst of triggers.
    pub debounce_window: Duration,
    /// Hard ceiling on the total debounce wait, measured from the first
    /// trigger of the burst.
    pub debounce_ceiling: Duration,
    /// Time-spent delta that counts as significant on its own for
    /// automatic saves.
    pub auto_time_delta: Duration,
    /// Time-spent delta that counts as significant on its own for manual
    /// saves.
    pub manual_time_delta: Duration,
    /// Base unit of the jittered pre-write delay for automatic saves.
    pub backoff_base: Duration,
    /// Cap on the geometric backoff multiplier.
    pub backoff_max_multiplier: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_save_period: Duration::from_secs(60),
            settle_threshold: Duration::from_secs(5),
            auto_save_min_interval: Duration::from_secs(60),
            manual_min_interval: Duration::from_secs(2),
            debounce_window: Duration::from_secs(2),
            debounce_ceiling: Duration::from_secs(5),
            auto_time_delta: Duration::from_secs(30),
            manual_time_delta: Duration::from_secs(15),
            backoff_base: Duration::from_millis(500),
            backoff_max_multiplier: 32,
        }
    }
}
