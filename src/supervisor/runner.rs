use super::state::{BackendStatus, SharedStatus, SupervisorState};
use crate::camera::Backend;
use crate::config::SupervisorConfig;
use crate::error::{CamkeeperError, StartError};
use crate::shutdown::ShutdownSignal;
use crate::watchdog::RestartTarget;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

struct Supervised<B> {
    backend: B,
    state: SupervisorState,
    /// Current instance has been started (or failed to) and must not be reused
    needs_replacement: bool,
    successful_starts: u64,
    shutdown_complete: bool,
}

/// Owns the backend across restarts.
///
/// Every start and stop happens while holding `inner`, so a crash restart and
/// a watchdog-forced restart can never overlap. Readers go through
/// [`SharedStatus`] instead.
pub struct Supervisor<B: Backend> {
    inner: Arc<Mutex<Supervised<B>>>,
    status: SharedStatus,
    wake: Arc<Notify>,
    config: SupervisorConfig,
    shutdown: ShutdownSignal,
}

impl<B: Backend> Clone for Supervisor<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            status: self.status.clone(),
            wake: Arc::clone(&self.wake),
            config: self.config.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<B: Backend> Supervisor<B> {
    pub fn new(backend: B, config: SupervisorConfig, shutdown: ShutdownSignal) -> Self {
        let status = SharedStatus::new(BackendStatus::new(backend.describe()));

        Self {
            inner: Arc::new(Mutex::new(Supervised {
                backend,
                state: SupervisorState::Stopped,
                needs_replacement: false,
                successful_starts: 0,
                shutdown_complete: false,
            })),
            status,
            wake: Arc::new(Notify::new()),
            config,
            shutdown,
        }
    }

    pub fn status(&self) -> SharedStatus {
        self.status.clone()
    }

    pub fn state(&self) -> SupervisorState {
        self.status.state()
    }

    /// Copy the backend's current view into the shared status.
    fn publish<F>(&self, inner: &Supervised<B>, f: F)
    where
        F: FnOnce(&mut BackendStatus),
    {
        let running = inner.backend.is_running();
        let info = inner.backend.describe();
        self.status.update(|status| {
            status.state = inner.state;
            status.running = running;
            status.info = info;
            if !running {
                status.started_at = None;
            }
            f(status);
        });
    }

    /// Supervision loop. Returns after the shutdown signal, with the backend stopped.
    pub async fn run(&self) {
        info!(
            "Supervisor started (poll every {:?}, retry after {:?})",
            self.config.poll_interval(),
            self.config.retry_delay()
        );

        while !self.shutdown.is_triggered() {
            match self.state() {
                SupervisorState::Stopped => {
                    if let Err(e) = self.start_backend().await {
                        warn!(
                            "Backend start failed: {}; retrying in {:?}",
                            e,
                            self.config.retry_delay()
                        );
                        self.sleep_unless_shutdown(self.config.retry_delay()).await;
                    }
                }
                SupervisorState::Running => {
                    self.pause(self.config.poll_interval()).await;
                    if !self.shutdown.is_triggered() {
                        self.check_liveness().await;
                    }
                }
                _ => self.pause(self.config.poll_interval()).await,
            }
        }

        self.shutdown().await;
        info!("Supervisor stopped");
    }

    /// Start the backend if the supervisor is in `Stopped`.
    pub async fn start_backend(&self) -> Result<(), StartError> {
        let mut inner = self.inner.lock().await;
        if inner.state != SupervisorState::Stopped
            || inner.shutdown_complete
            || self.shutdown.is_triggered()
        {
            return Ok(());
        }

        if inner.needs_replacement {
            inner.backend = inner.backend.replacement();
            inner.needs_replacement = false;
            debug!("Replaced backend with a fresh instance");
        }

        inner.state = SupervisorState::Starting;
        self.publish(&inner, |_| {});

        let result = inner.backend.start().await;
        inner.needs_replacement = true;

        match result {
            Ok(()) => {
                let running = inner.backend.is_running();
                inner.state = if running {
                    SupervisorState::Running
                } else {
                    SupervisorState::Idle
                };
                let restarted = inner.successful_starts > 0;
                inner.successful_starts += 1;

                self.publish(&inner, |status| {
                    status.started_at = running.then(Instant::now);
                    status.last_error = None;
                    if restarted {
                        status.restarts += 1;
                    }
                });

                if running {
                    info!("Backend {} is running", inner.backend.describe().name);
                } else {
                    info!(
                        "Backend {} started without a capture process",
                        inner.backend.describe().name
                    );
                }
                Ok(())
            }
            Err(e) => {
                inner.state = SupervisorState::Stopped;
                self.publish(&inner, |status| {
                    status.last_error = Some(e.to_string());
                });
                Err(e)
            }
        }
    }

    /// Poll the running backend once. Returns false when a crash was handled.
    pub async fn check_liveness(&self) -> bool {
        {
            let mut inner = self.inner.lock().await;
            if inner.state != SupervisorState::Running || inner.backend.is_alive() {
                return true;
            }

            inner.state = SupervisorState::CrashDetected;
            let info = inner.backend.describe();
            let exit = info
                .last_exit
                .clone()
                .unwrap_or_else(|| "exit status unknown".to_string());
            self.publish(&inner, |status| {
                status.crashes += 1;
                status.last_error = Some(exit.clone());
            });

            let crash = CamkeeperError::ProcessCrash {
                backend: info.name,
                status: exit,
            };
            error!("{}", crash);

            inner.backend.stop().await;
            inner.needs_replacement = true;
            self.publish(&inner, |_| {});
        }

        self.sleep_unless_shutdown(self.config.crash_cooldown()).await;

        let mut inner = self.inner.lock().await;
        if inner.state == SupervisorState::CrashDetected {
            inner.state = SupervisorState::Stopped;
            self.publish(&inner, |_| {});
        }
        false
    }

    /// Stop the running backend and hand it back to the loop for a fresh start.
    /// Returns false when there was nothing running to restart.
    pub async fn force_restart(&self, reason: &str) -> bool {
        let mut inner = self.inner.lock().await;
        if self.shutdown.is_triggered() || inner.state != SupervisorState::Running {
            debug!(
                "Ignoring restart request in state {:?}: {}",
                inner.state, reason
            );
            return false;
        }

        warn!("Forcing backend restart: {}", reason);
        inner.backend.stop().await;
        inner.needs_replacement = true;
        inner.state = SupervisorState::Stopped;
        self.publish(&inner, |status| {
            status.forced_restarts += 1;
            status.last_error = Some(reason.to_string());
        });
        drop(inner);

        self.wake.notify_one();
        true
    }

    /// Stop the backend for good. Only the first call stops anything.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        if inner.shutdown_complete {
            return;
        }

        inner.state = SupervisorState::StopRequested;
        self.publish(&inner, |_| {});

        inner.backend.stop().await;
        inner.shutdown_complete = true;
        inner.state = SupervisorState::Stopped;
        self.publish(&inner, |_| {});

        info!("Backend stopped for shutdown");
    }

    /// Sleep that also ends early on shutdown or a restart request.
    async fn pause(&self, duration: Duration) {
        tokio::select! {
            _ = sleep(duration) => {}
            _ = self.shutdown.triggered() => {}
            _ = self.wake.notified() => {}
        }
    }

    async fn sleep_unless_shutdown(&self, duration: Duration) {
        tokio::select! {
            _ = sleep(duration) => {}
            _ = self.shutdown.triggered() => {}
        }
    }
}

#[async_trait]
impl<B: Backend> RestartTarget for Supervisor<B> {
    fn backend_running(&self) -> bool {
        self.status.is_running()
    }

    async fn force_restart(&self, reason: &str) -> bool {
        Supervisor::force_restart(self, reason).await
    }
}
