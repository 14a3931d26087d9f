//! Playtime accounting through the full monitor loop.

use std::sync::Arc;
use std::time::Duration;

use playtime_monitor::monitor::{LifecycleState, MonitorEvent};

use super::support::{advance, build, spawn_ready, FakeSource, Fixture, MemoryStore};

#[tokio::test(start_paused = true)]
async fn test_shutdown_credits_running_session() {
    let fixture = Fixture::new(&["game.bin"]);
    let store = Arc::new(MemoryStore::default());
    let source = Arc::new(FakeSource::default());
    source.set_running(&["game.bin"]);

    let (monitor, _tx) = build(&store, &source, fixture.settings(&["game.bin"]), 600);
    let running = spawn_ready(monitor);

    advance(150).await;
    let summary = running.stop().await.unwrap();

    assert_eq!(store.total("game.bin"), 2);
    assert_eq!(summary.final_state, LifecycleState::Cancelled);
    assert!(summary.unflushed.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_periodic_flush_then_shutdown_adds_up() {
    let fixture = Fixture::new(&["game.bin"]);
    let store = Arc::new(MemoryStore::default());
    let source = Arc::new(FakeSource::default());
    source.set_running(&["game.bin"]);

    let (monitor, _tx) = build(&store, &source, fixture.settings(&["game.bin"]), 60);
    let running = spawn_ready(monitor);

    advance(125).await;
    assert_eq!(store.total("game.bin"), 2);

    advance(60).await;
    let summary = running.stop().await.unwrap();
    assert_eq!(store.total("game.bin"), 3);
    assert_eq!(summary.minutes_flushed, 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_flush_is_retried() {
    let fixture = Fixture::new(&["game.bin"]);
    let store = Arc::new(MemoryStore::default());
    store.fail_next(1);
    let source = Arc::new(FakeSource::default());
    source.set_running(&["game.bin"]);

    let (monitor, _tx) = build(&store, &source, fixture.settings(&["game.bin"]), 60);
    let running = spawn_ready(monitor);

    advance(90).await;
    assert_eq!(store.total("game.bin"), 0);

    advance(35).await;
    assert_eq!(store.total("game.bin"), 2);

    let summary = running.stop().await.unwrap();
    assert_eq!(summary.flush_failures, 1);
    assert_eq!(store.total("game.bin"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stop_and_events() {
    let fixture = Fixture::new(&["game.bin"]);
    let store = Arc::new(MemoryStore::default());
    let source = Arc::new(FakeSource::default());
    source.set_running(&["game.bin"]);

    let (monitor, _tx) = build(&store, &source, fixture.settings(&["game.bin"]), 600);
    let mut events = monitor.subscribe();
    let running = spawn_ready(monitor);

    advance(182).await;
    source.set_running(&[]);
    advance(60).await;
    running.stop().await.unwrap();

    // Seen from t=0 through t=180, gone at t=185.
    assert_eq!(store.total("game.bin"), 3);

    let mut started = 0;
    let mut stopped = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            MonitorEvent::Started { executable, .. } => {
                assert_eq!(executable, "game.bin");
                started += 1;
            }
            MonitorEvent::Stopped { minutes, .. } => stopped.push(minutes),
            _ => {}
        }
    }
    assert_eq!(started, 1);
    assert_eq!(stopped, vec![3]);
}

#[tokio::test(start_paused = true)]
async fn test_enumeration_failure_keeps_session_open() {
    let fixture = Fixture::new(&["game.bin"]);
    let store = Arc::new(MemoryStore::default());
    let source = Arc::new(FakeSource::default());
    source.set_running(&["game.bin"]);

    let (monitor, _tx) = build(&store, &source, fixture.settings(&["game.bin"]), 600);
    let running = spawn_ready(monitor);

    advance(22).await;
    source.set_failing(true);
    advance(30).await;
    source.set_failing(false);
    advance(70).await;

    let summary = running.stop().await.unwrap();
    assert!(summary.enumeration_failures >= 5);
    assert_eq!(store.total("game.bin"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_instances_count_once() {
    let fixture = Fixture::new(&["game.bin", "tool.bin"]);
    let store = Arc::new(MemoryStore::default());
    let source = Arc::new(FakeSource::default());
    source.set_running(&["game.bin", "game.bin", "tool.bin"]);

    let (monitor, _tx) = build(
        &store,
        &source,
        fixture.settings(&["game.bin", "tool.bin"]),
        600,
    );
    let running = spawn_ready(monitor);

    advance(121).await;
    running.stop().await.unwrap();

    assert_eq!(store.total("game.bin"), 2);
    assert_eq!(store.total("tool.bin"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_final_flush_is_bounded() {
    let fixture = Fixture::new(&["game.bin"]);
    let store = Arc::new(MemoryStore::default());
    store.hang();
    let source = Arc::new(FakeSource::default());
    source.set_running(&["game.bin"]);

    let (monitor, _tx) = build(&store, &source, fixture.settings(&["game.bin"]), 600);
    let running = spawn_ready(monitor);

    advance(150).await;
    let summary = running.stop().await.unwrap();

    assert_eq!(summary.final_state, LifecycleState::Cancelled);
    assert_eq!(summary.unflushed.get("game.bin"), Some(&2));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_stuck_periodic_flush() {
    let fixture = Fixture::new(&["game.bin"]);
    let store = Arc::new(MemoryStore::default());
    store.hang();
    let source = Arc::new(FakeSource::default());
    source.set_running(&["game.bin"]);

    let (monitor, _tx) = build(&store, &source, fixture.settings(&["game.bin"]), 60);
    let running = spawn_ready(monitor);

    // The flush at t=60 never completes.
    advance(65).await;
    running.cancel.cancel();
    let started = tokio::time::Instant::now();
    let summary = tokio::time::timeout(Duration::from_secs(30), running.handle)
        .await
        .expect("monitor should exit after cancellation")
        .unwrap()
        .unwrap();

    // One shutdown timeout covers the stuck write and the final flush.
    assert!(started.elapsed() <= Duration::from_secs(5));
    assert_eq!(summary.final_state, LifecycleState::Cancelled);
    assert_eq!(summary.unflushed.get("game.bin"), Some(&1));
    assert_eq!(store.total("game.bin"), 0);
}
