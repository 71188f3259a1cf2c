use super::types::{ComponentState, ShutdownOutcome, ShutdownReason};
use super::CamkeeperOrchestrator;
use crate::camera::Backend;
use crate::error::CamkeeperError;
use crate::shutdown::ShutdownSignal;
use crate::supervisor::Supervisor;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// How long a task gets to notice the shutdown signal before it is aborted
const TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Turns a termination request into an orderly backend teardown.
///
/// Sets the shutdown signal so every loop stops at its next iteration, then
/// stops the backend through the supervisor. Teardown is bounded; when it
/// overruns, the daemon reports a degraded exit instead of hanging.
pub struct ShutdownCoordinator<B: Backend> {
    signal: ShutdownSignal,
    supervisor: Supervisor<B>,
    teardown_timeout: Duration,
}

impl<B: Backend> Clone for ShutdownCoordinator<B> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
            supervisor: self.supervisor.clone(),
            teardown_timeout: self.teardown_timeout,
        }
    }
}

impl<B: Backend> ShutdownCoordinator<B> {
    pub fn new(
        signal: ShutdownSignal,
        supervisor: Supervisor<B>,
        teardown_timeout: Duration,
    ) -> Self {
        Self {
            signal,
            supervisor,
            teardown_timeout,
        }
    }

    pub fn signal(&self) -> &ShutdownSignal {
        &self.signal
    }

    /// Safe to call more than once; the backend is stopped at most once.
    pub async fn shutdown(&self, reason: &ShutdownReason) -> ShutdownOutcome {
        if self.signal.trigger() {
            info!("Shutdown initiated: {}", reason);
        } else {
            debug!("Shutdown already in progress ({})", reason);
        }

        match timeout(self.teardown_timeout, self.supervisor.shutdown()).await {
            Ok(()) => ShutdownOutcome::Clean,
            Err(_) => {
                let err = CamkeeperError::ShutdownTimeout {
                    timeout: self.teardown_timeout,
                };
                error!("{}", err);
                ShutdownOutcome::TimedOut
            }
        }
    }
}

impl<B: Backend> CamkeeperOrchestrator<B> {
    /// Stop the backend, then wait for every spawned task. Returns the exit code.
    pub async fn shutdown(&mut self, reason: ShutdownReason) -> i32 {
        info!("Beginning graceful shutdown");

        let outcome = self.coordinator.shutdown(&reason).await;

        let tasks = std::mem::take(&mut self.tasks);
        for (component, mut handle) in tasks {
            if self.component_state(component) != Some(ComponentState::Failed) {
                self.set_component_state(component, ComponentState::Stopping);
            }

            match timeout(TASK_JOIN_TIMEOUT, &mut handle).await {
                Ok(Ok(())) => {
                    if self.component_state(component) == Some(ComponentState::Stopping) {
                        self.set_component_state(component, ComponentState::Stopped);
                    }
                    info!("{} stopped", component);
                }
                Ok(Err(e)) => {
                    self.set_component_state(component, ComponentState::Failed);
                    error!("{} task failed: {}", component, e);
                }
                Err(_) => {
                    handle.abort();
                    self.set_component_state(component, ComponentState::Failed);
                    warn!(
                        "{} did not stop within {:?}, aborted",
                        component, TASK_JOIN_TIMEOUT
                    );
                }
            }
        }

        let exit_code = outcome.exit_code();
        info!("Graceful shutdown completed with exit code: {}", exit_code);
        exit_code
    }

    /// Ask a running [`run`](Self::run) to shut down.
    pub fn request_shutdown(&self) {
        if self.shutdown.trigger() {
            info!("Shutdown requested");
        }
    }
}
