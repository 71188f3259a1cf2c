use super::relay::RelayProbe;
use super::state::{SharedWatchdogState, WatchdogState};
use crate::config::WatchdogConfig;
use crate::shutdown::ShutdownSignal;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Whatever the watchdog can ask to restart the backend.
///
/// The watchdog never starts a backend itself; it stops the current one and
/// leaves the next start to the owner.
#[async_trait]
pub trait RestartTarget: Send + Sync {
    fn backend_running(&self) -> bool;

    async fn force_restart(&self, reason: &str) -> bool;
}

#[async_trait]
impl<T: RestartTarget + ?Sized> RestartTarget for Arc<T> {
    fn backend_running(&self) -> bool {
        (**self).backend_running()
    }

    async fn force_restart(&self, reason: &str) -> bool {
        (**self).force_restart(reason).await
    }
}

/// Result of one watchdog iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Backend not running, nothing checked
    Skipped,
    Visible,
    NotVisible { failures: u32 },
    RestartTriggered,
}

/// Periodically confirms the relay is receiving the stream and forces a
/// restart after `failure_threshold` consecutive misses.
pub struct StreamWatchdog<P: RelayProbe, T: RestartTarget> {
    probe: P,
    target: T,
    state: SharedWatchdogState,
    check_interval: Duration,
    failure_threshold: u32,
    shutdown: ShutdownSignal,
}

impl<P: RelayProbe, T: RestartTarget> StreamWatchdog<P, T> {
    pub fn new(
        config: &WatchdogConfig,
        stream_path: &str,
        probe: P,
        target: T,
        shutdown: ShutdownSignal,
    ) -> Self {
        let state = SharedWatchdogState::new(WatchdogState::new(
            probe.endpoint(),
            stream_path,
            config.check_interval_secs,
            config.failure_threshold,
        ));

        Self {
            probe,
            target,
            state,
            check_interval: config.check_interval(),
            failure_threshold: config.failure_threshold.max(1),
            shutdown,
        }
    }

    pub fn state(&self) -> SharedWatchdogState {
        self.state.clone()
    }

    /// Check every interval until shutdown. The first check happens one
    /// interval after the call.
    pub async fn run(&self) {
        info!(
            "Stream watchdog started ({} every {:?}, threshold {})",
            self.probe.endpoint(),
            self.check_interval,
            self.failure_threshold
        );

        let mut ticker = interval_at(Instant::now() + self.check_interval, self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.triggered() => break,
                _ = ticker.tick() => {}
            }

            if self.shutdown.is_triggered() {
                break;
            }

            self.check_once().await;
        }

        info!("Stream watchdog stopped");
    }

    pub async fn check_once(&self) -> CheckOutcome {
        if !self.target.backend_running() {
            debug!("Backend not running, skipping visibility check");
            self.state.mark_paused();
            return CheckOutcome::Skipped;
        }

        let error = match self.probe.check_stream().await {
            Ok(()) => {
                if self.state.record_success() {
                    info!("Stream is visible on the relay again");
                } else {
                    debug!("Stream is visible on the relay");
                }
                return CheckOutcome::Visible;
            }
            Err(e) => e,
        };

        let failures = self.state.record_failure(&error.to_string());
        warn!(
            "Stream visibility check failed ({}/{}): {}",
            failures, self.failure_threshold, error
        );

        if failures < self.failure_threshold {
            return CheckOutcome::NotVisible { failures };
        }

        error!(
            "Stream not visible after {} consecutive checks, forcing backend restart",
            failures
        );
        let reason = format!(
            "stream not visible on relay after {} consecutive checks",
            failures
        );
        let restarted = self.target.force_restart(&reason).await;
        if !restarted {
            warn!("Restart request was not applied; backend already stopping");
        }
        self.state.reset_after_restart(restarted);

        CheckOutcome::RestartTriggered
    }
}
