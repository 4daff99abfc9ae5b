// tests/watchdog_timing.rs
//
// The deadline arithmetic is tested synchronously on `WatchdogState`; the
// timer task is tested with short real timeouts and generous margins.

use std::time::Duration;

use tokio::time::{timeout, Instant};

use testwatch::events::{EventBus, RunEvent};
use testwatch::watchdog::{
    spawn_watchdog, Activity, TimeoutPhase, WatchdogState, DEFAULT_HANG_TIMEOUT,
};
use testwatch_test_utils::init_tracing;

const BOOTSTRAP: Duration = Duration::from_millis(100);
const CONFIGURED: Duration = Duration::from_millis(400);

#[test]
fn default_timeout_is_ten_minutes() {
    assert_eq!(DEFAULT_HANG_TIMEOUT, Duration::from_secs(600));
}

#[tokio::test]
async fn arming_sets_a_deadline_one_timeout_out() {
    let mut state = WatchdogState::new(BOOTSTRAP, CONFIGURED);
    assert!(!state.is_armed());
    assert_eq!(state.deadline(), None);

    let now = Instant::now();
    state.arm(now);
    assert!(state.is_armed());
    assert_eq!(state.phase(), TimeoutPhase::Bootstrap);
    assert_eq!(state.deadline(), Some(now + BOOTSTRAP));
}

#[tokio::test]
async fn activity_pushes_the_deadline_out() {
    let mut state = WatchdogState::new(BOOTSTRAP, CONFIGURED);
    let now = Instant::now();
    state.arm(now);

    let later = now + Duration::from_millis(60);
    state.record_activity(later, "test started: com.acme.app.ATest".to_string());
    assert_eq!(state.deadline(), Some(later + BOOTSTRAP));
}

#[tokio::test]
async fn activity_while_disarmed_does_not_rearm() {
    let mut state = WatchdogState::new(BOOTSTRAP, CONFIGURED);
    let now = Instant::now();
    state.arm(now);
    state.disarm();

    // A ping racing the disarm must not resurrect the deadline.
    state.record_activity(now + Duration::from_millis(10), "late ping".to_string());
    assert!(!state.is_armed());
    assert_eq!(state.deadline(), None);
}

#[tokio::test]
async fn boot_completion_switches_to_the_configured_timeout() {
    let mut state = WatchdogState::new(BOOTSTRAP, CONFIGURED);
    let now = Instant::now();
    state.arm(now);

    let at = now + Duration::from_millis(20);
    state.boot_complete(at);
    assert_eq!(state.phase(), TimeoutPhase::Configured);
    assert_eq!(state.timeout(), CONFIGURED);
    // An armed deadline is recomputed from the switch point.
    assert_eq!(state.deadline(), Some(at + CONFIGURED));

    // Idempotent: a second switch changes nothing.
    state.boot_complete(at + Duration::from_millis(5));
    assert_eq!(state.deadline(), Some(at + CONFIGURED));
}

#[tokio::test]
async fn firing_dumps_and_rearms_for_the_next_window() {
    let mut state = WatchdogState::new(BOOTSTRAP, CONFIGURED);
    let now = Instant::now();
    state.arm(now);

    let due = now + BOOTSTRAP + Duration::from_millis(20);
    let dump = state.fire_if_due(due).expect("deadline passed; must fire");
    assert_eq!(dump.phase, TimeoutPhase::Bootstrap);
    assert_eq!(dump.quiet_for, due.duration_since(now));
    assert!(dump.last_activity.is_none());
    assert!(!dump.backtrace.is_empty());

    // Re-armed: not due again until another full window passes.
    assert!(state.fire_if_due(due + Duration::from_millis(10)).is_none());
    assert!(state.fire_if_due(due + BOOTSTRAP).is_some());
}

#[tokio::test]
async fn late_activity_suppresses_a_pending_fire() {
    let mut state = WatchdogState::new(BOOTSTRAP, CONFIGURED);
    let now = Instant::now();
    state.arm(now);

    // The timer elapsed, but activity slipped in before the state lock was
    // taken: the recomputed deadline wins.
    state.record_activity(
        now + Duration::from_millis(90),
        "test finished: com.acme.app.ATest".to_string(),
    );
    assert!(state.fire_if_due(now + BOOTSTRAP).is_none());
}

#[tokio::test]
async fn watchdog_task_fires_and_publishes_a_dump() {
    init_tracing();
    let events = EventBus::new(64);
    let mut rx = events.subscribe();
    let handle = spawn_watchdog(
        Duration::from_millis(50),
        Duration::from_secs(600),
        events.clone(),
    );

    handle.arm();
    let fired = timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("watchdog did not fire")
        .expect("event stream closed");
    match fired.event {
        RunEvent::WatchdogFired { dump } => {
            assert_eq!(dump.phase, TimeoutPhase::Bootstrap);
            assert!(dump.quiet_for >= Duration::from_millis(50));
        }
        other => panic!("expected WatchdogFired, got {other:?}"),
    }

    // Still armed: a second window elapses and fires again on its own.
    let again = timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("watchdog did not re-arm")
        .expect("event stream closed");
    assert!(matches!(again.event, RunEvent::WatchdogFired { .. }));

    handle.shutdown();
}

#[tokio::test]
async fn pings_keep_a_slow_run_alive() {
    init_tracing();
    let events = EventBus::new(64);
    let mut rx = events.subscribe();
    let handle = spawn_watchdog(
        Duration::from_millis(200),
        Duration::from_secs(600),
        events.clone(),
    );

    handle.arm();
    // Activity every 50ms for well over one timeout window.
    for _ in 0..6 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.ping(Activity::TestFinished, "com.acme.app.SlowTest");
    }
    assert!(rx.try_recv().is_err(), "watchdog fired despite activity");

    // Activity stops; now the dump arrives.
    let fired = timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("watchdog did not fire after activity stopped")
        .expect("event stream closed");
    match fired.event {
        RunEvent::WatchdogFired { dump } => {
            let last = dump.last_activity.expect("last activity recorded");
            assert!(last.contains("SlowTest"));
        }
        other => panic!("expected WatchdogFired, got {other:?}"),
    }

    handle.shutdown();
}

#[tokio::test]
async fn disarm_prevents_firing() {
    init_tracing();
    let events = EventBus::new(64);
    let mut rx = events.subscribe();
    let handle = spawn_watchdog(
        Duration::from_millis(50),
        Duration::from_secs(600),
        events.clone(),
    );

    handle.arm();
    handle.disarm();
    // A late ping must not resurrect the deadline either.
    handle.ping(Activity::PhaseBoundary, "unit phase done");

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(rx.try_recv().is_err(), "watchdog fired while disarmed");

    handle.shutdown();
}

#[tokio::test]
async fn boot_completion_shortens_an_armed_window() {
    init_tracing();
    let events = EventBus::new(64);
    let mut rx = events.subscribe();
    // Bootstrap far out; the configured timeout is the short one.
    let handle = spawn_watchdog(
        Duration::from_secs(600),
        Duration::from_millis(50),
        events.clone(),
    );

    assert_eq!(handle.phase(), TimeoutPhase::Bootstrap);
    handle.arm();
    handle.boot_complete();
    assert_eq!(handle.phase(), TimeoutPhase::Configured);

    let fired = timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("configured timeout never applied")
        .expect("event stream closed");
    match fired.event {
        RunEvent::WatchdogFired { dump } => assert_eq!(dump.phase, TimeoutPhase::Configured),
        other => panic!("expected WatchdogFired, got {other:?}"),
    }

    handle.shutdown();
}

#[tokio::test]
async fn shutdown_stops_the_timer_task() {
    init_tracing();
    let events = EventBus::new(64);
    let mut rx = events.subscribe();
    let handle = spawn_watchdog(
        Duration::from_millis(50),
        Duration::from_secs(600),
        events.clone(),
    );

    handle.arm();
    handle.shutdown();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(rx.try_recv().is_err(), "watchdog fired after shutdown");
}
