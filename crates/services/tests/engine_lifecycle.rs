mod support;

use std::time::Duration;

use tokio::time::sleep;

use lesson_core::model::ProgressSnapshot;
use services::SyncEvent;
use support::{start_engine, RecordingStore};

#[tokio::test(start_paused = true)]
async fn unchanged_state_saves_once() {
    let store = RecordingStore::new();
    let (handle, mut events) = start_engine(&store, 4, None);

    handle.answer_changed(0, "a");
    handle.manual_save();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(store.call_count(), 1);
    assert!(matches!(
        events.try_recv(),
        Ok(SyncEvent::ManualSaveSucceeded)
    ));

    // Past the manual rate window but with nothing meaningful to persist:
    // the second press never reaches the network.
    sleep(Duration::from_secs(3)).await;
    handle.manual_save();
    sleep(Duration::from_secs(1)).await;

    assert_eq!(store.call_count(), 1);
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn writes_never_overlap() {
    let store = RecordingStore::with_latency(Duration::from_secs(10));
    let (handle, _events) = start_engine(&store, 4, None);

    handle.answer_changed(0, "a");
    handle.manual_save();
    sleep(Duration::from_secs(3)).await;

    // A second save becomes due while the first is still in flight; it
    // queues behind the slot instead of starting a parallel write.
    handle.section_changed(1);
    sleep(Duration::from_secs(24)).await;

    assert_eq!(store.call_count(), 2);
    assert_eq!(store.max_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn double_manual_press_saves_once() {
    let store = RecordingStore::with_latency(Duration::from_secs(3));
    let (handle, mut events) = start_engine(&store, 4, None);

    handle.answer_changed(0, "a");
    handle.manual_save();
    sleep(Duration::from_millis(800)).await;
    handle.manual_save();
    sleep(Duration::from_millis(100)).await;

    // The second press is absorbed; the control stays disabled throughout.
    assert!(handle.is_saving());
    sleep(Duration::from_secs(3)).await;

    assert!(!handle.is_saving());
    assert_eq!(store.call_count(), 1);
    assert!(matches!(
        events.try_recv(),
        Ok(SyncEvent::ManualSaveSucceeded)
    ));
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn teardown_flushes_latest_state() {
    let store = RecordingStore::new();
    let (handle, _events) = start_engine(&store, 4, None);

    handle.answer_changed(0, "a");
    handle.manual_save();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(store.call_count(), 1);

    // Well inside the 60s automatic rate window; the flush ignores it.
    handle.section_changed(2);
    sleep(Duration::from_millis(500)).await;
    handle.teardown();
    sleep(Duration::from_secs(1)).await;

    let calls = store.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].last_position(), "2");
}

#[tokio::test(start_paused = true)]
async fn teardown_with_write_in_flight_adds_nothing() {
    let store = RecordingStore::with_latency(Duration::from_secs(5));
    let (handle, _events) = start_engine(&store, 4, None);

    handle.answer_changed(0, "a");
    handle.manual_save();
    sleep(Duration::from_secs(1)).await;

    handle.teardown();
    sleep(Duration::from_secs(10)).await;

    // The in-flight write completed on its own; no final flush joined it.
    assert_eq!(store.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_tears_down() {
    let store = RecordingStore::new();
    let (handle, _events) = start_engine(&store, 4, None);

    handle.section_changed(1);
    sleep(Duration::from_millis(100)).await;
    drop(handle);
    sleep(Duration::from_secs(1)).await;

    let calls = store.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].last_position(), "1");
}

#[tokio::test(start_paused = true)]
async fn hydrated_view_resumes_persisted_counters() {
    let store = RecordingStore::new();
    let initial =
        ProgressSnapshot::new(1.0, 300, true, Some(88.0), "3", Some("keep".into())).unwrap();
    let (handle, _events) = start_engine(&store, 4, Some(initial));

    handle.answer_changed(1, "b");
    sleep(Duration::from_secs(10)).await;

    let calls = store.calls();
    assert_eq!(calls.len(), 1);
    let snapshot = &calls[0];
    // Completion never travels back to false, time only accrues, and notes
    // pass through untouched.
    assert!(snapshot.completed());
    assert!(snapshot.time_spent_seconds() >= 300);
    assert_eq!(snapshot.last_position(), "3");
    assert_eq!(snapshot.score(), Some(88.0));
    assert_eq!(snapshot.notes(), Some("keep"));
}
