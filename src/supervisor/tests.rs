use super::*;
use crate::camera::mock::{MockBackend, MockShared};
use crate::camera::BackendKind;
use crate::config::SupervisorConfig;
use crate::shutdown::ShutdownSignal;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;

fn create_test_supervisor_config() -> SupervisorConfig {
    SupervisorConfig {
        poll_interval_secs: 2,
        retry_delay_secs: 5,
        crash_cooldown_secs: 2,
        shutdown_timeout_secs: 10,
    }
}

fn spawn_supervisor(
    backend: MockBackend,
) -> (Supervisor<MockBackend>, ShutdownSignal, JoinHandle<()>) {
    let shutdown = ShutdownSignal::new();
    let supervisor = Supervisor::new(backend, create_test_supervisor_config(), shutdown.clone());
    let runner = supervisor.clone();
    let handle = tokio::spawn(async move { runner.run().await });
    (supervisor, shutdown, handle)
}

#[tokio::test(start_paused = true)]
async fn test_starts_backend_immediately() {
    let (backend, shared) = MockBackend::new();
    let (supervisor, shutdown, handle) = spawn_supervisor(backend);

    sleep(Duration::from_millis(100)).await;

    assert_eq!(shared.starts(), 1);
    assert_eq!(supervisor.state(), SupervisorState::Running);

    let status = supervisor.status().snapshot();
    assert!(status.running);
    assert!(status.started_at.is_some());
    assert_eq!(status.restarts, 0);
    assert_eq!(status.info.kind, BackendKind::Usb);

    shutdown.trigger();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_crash_is_detected_and_restarted() {
    let (backend, shared) = MockBackend::new();
    let (supervisor, shutdown, handle) = spawn_supervisor(backend);

    // Polls happen at t=2,4,6,8,10; the process dies at t=9
    sleep(Duration::from_secs(9)).await;
    assert!(supervisor.status().is_running());
    shared.crash();

    sleep(Duration::from_millis(1500)).await;
    let status = supervisor.status().snapshot();
    assert!(!status.running, "crash should be visible within one poll");
    assert_eq!(status.state, SupervisorState::CrashDetected);
    assert_eq!(status.crashes, 1);
    assert_eq!(shared.starts(), 1);
    assert_eq!(shared.stops(), 1);

    // Cooldown ends at t=12 and the loop starts a fresh instance
    sleep(Duration::from_secs(2)).await;
    let status = supervisor.status().snapshot();
    assert_eq!(shared.starts(), 2);
    assert!(status.running);
    assert_eq!(status.restarts, 1);
    assert_eq!(status.info.name, "mock camera #2");

    shutdown.trigger();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failed_start_retries_after_fixed_delay() {
    let (backend, shared) = MockBackend::new();
    shared.failing_starts.store(2, Ordering::SeqCst);
    let (supervisor, shutdown, handle) = spawn_supervisor(backend);

    sleep(Duration::from_millis(4900)).await;
    assert_eq!(shared.starts(), 1);
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
    assert!(supervisor
        .status()
        .snapshot()
        .last_error
        .unwrap()
        .contains("not found"));

    sleep(Duration::from_millis(200)).await;
    assert_eq!(shared.starts(), 2);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(shared.starts(), 3);
    assert_eq!(supervisor.state(), SupervisorState::Running);
    assert!(supervisor.status().snapshot().last_error.is_none());

    shutdown.trigger();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_idle_backend_is_not_restarted() {
    let (backend, shared) = MockBackend::idle();
    let (supervisor, shutdown, handle) = spawn_supervisor(backend);

    sleep(Duration::from_secs(30)).await;

    assert_eq!(shared.starts(), 1);
    assert_eq!(supervisor.state(), SupervisorState::Idle);
    assert!(!supervisor.status().is_running());
    assert_eq!(supervisor.status().snapshot().info.kind, BackendKind::Null);

    shutdown.trigger();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_force_restart_hands_back_to_loop() {
    let (backend, shared) = MockBackend::new();
    let (supervisor, shutdown, handle) = spawn_supervisor(backend);

    sleep(Duration::from_millis(100)).await;
    assert!(supervisor.force_restart("test restart").await);

    // The restart wakes the loop instead of waiting for the next poll
    sleep(Duration::from_millis(100)).await;
    let status = supervisor.status().snapshot();
    assert_eq!(shared.starts(), 2);
    assert_eq!(shared.stops(), 1);
    assert!(status.running);
    assert_eq!(status.forced_restarts, 1);
    assert_eq!(status.restarts, 1);

    shutdown.trigger();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_force_restart_ignored_when_not_running() {
    let (backend, shared) = MockBackend::new();
    let supervisor = Supervisor::new(
        backend,
        create_test_supervisor_config(),
        ShutdownSignal::new(),
    );

    assert!(!supervisor.force_restart("nothing running").await);
    assert_eq!(shared.stops(), 0);
    assert_eq!(supervisor.status().snapshot().forced_restarts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_restarts_never_overlap() {
    let (backend, shared) = MockBackend::new();
    let (supervisor, shutdown, handle) = spawn_supervisor(backend);

    for round in 0..5 {
        sleep(Duration::from_millis(500)).await;
        if round % 2 == 0 {
            shared.crash();
        }

        let mut requests = Vec::new();
        for _ in 0..4 {
            let supervisor = supervisor.clone();
            requests.push(tokio::spawn(async move {
                supervisor.force_restart("concurrent request").await
            }));
        }
        for request in requests {
            request.await.unwrap();
        }
    }

    sleep(Duration::from_secs(10)).await;

    assert!(shared.max_active.load(Ordering::SeqCst) <= 1);
    assert!(shared.active.load(Ordering::SeqCst) <= 1);
    assert!(shared.starts() > 1);

    shutdown.trigger();
    handle.await.unwrap();
    assert_eq!(shared.active.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_backend_once() {
    let (backend, shared): (MockBackend, Arc<MockShared>) = MockBackend::new();
    let (supervisor, shutdown, handle) = spawn_supervisor(backend);

    sleep(Duration::from_millis(100)).await;
    assert!(shutdown.trigger());
    handle.await.unwrap();

    assert_eq!(shared.stops(), 1);
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
    assert!(!supervisor.status().is_running());

    // A second shutdown path (e.g. the coordinator) is a no-op
    supervisor.shutdown().await;
    assert_eq!(shared.stops(), 1);

    // No restarts once shut down
    sleep(Duration::from_secs(10)).await;
    assert_eq!(shared.starts(), 1);
    assert!(supervisor.start_backend().await.is_ok());
    assert_eq!(shared.starts(), 1);
}
