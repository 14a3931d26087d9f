//! Monitor loop tests.

mod resolver_test;
mod support;
mod tracking_test;

/// Verify the public monitor types are exported from the library.
#[test]
fn test_all_monitor_types_exported() {
    use playtime_monitor::monitor::{
        resolve_watch_set, whole_minutes, ActivityState, ActivityTracker, AggregationSink,
        FlushReport, LifecycleState, Monitor, MonitorError, MonitorEvent, MonitorSummary,
        ProcessSnapshot, ProcessSource, SysinfoSource, Transition, WatchSet, WatchedExecutable,
    };

    let _ = ActivityTracker::new(["game.bin"]);
    let _ = ProcessSnapshot::new();
    let _ = WatchSet::new();
    let _ = FlushReport::default();
    let _ = MonitorSummary::default();
    let _ = SysinfoSource::default();
    let _: fn(&str) -> Result<WatchSet, MonitorError> = resolve_watch_set;
    let _ = whole_minutes(std::time::Duration::from_secs(60));
    let _ = WatchedExecutable::from_path("/apps/game.bin");
    let _ = LifecycleState::Stopped;
    let _ = ActivityState::Idle;
    let _: Option<Transition> = None;
    let _: Option<MonitorEvent> = None;
    let _: Option<AggregationSink> = None;
    let _: Option<Monitor> = None;
    let _: Option<Box<dyn ProcessSource>> = None;
}
