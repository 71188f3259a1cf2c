use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// Watchdog counters. Written only by the watchdog loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchdogState {
    pub relay_api_endpoint: String,
    pub stream_path: String,
    pub check_interval_secs: u64,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    /// Result of the latest check
    pub stream_visible: bool,
    pub last_success: Option<DateTime<Utc>>,
    pub last_check: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub restarts_triggered: u64,
}

impl WatchdogState {
    pub fn new(
        relay_api_endpoint: &str,
        stream_path: &str,
        check_interval_secs: u64,
        failure_threshold: u32,
    ) -> Self {
        Self {
            relay_api_endpoint: relay_api_endpoint.to_string(),
            stream_path: stream_path.to_string(),
            check_interval_secs,
            consecutive_failures: 0,
            failure_threshold,
            stream_visible: false,
            last_success: None,
            last_check: None,
            last_error: None,
            restarts_triggered: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SharedWatchdogState(Arc<RwLock<WatchdogState>>);

impl SharedWatchdogState {
    pub fn new(state: WatchdogState) -> Self {
        Self(Arc::new(RwLock::new(state)))
    }

    pub fn snapshot(&self) -> WatchdogState {
        self.0.read().clone()
    }

    pub fn stream_visible(&self) -> bool {
        self.0.read().stream_visible
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.0.read().consecutive_failures
    }

    /// Returns true when this success ends a failure streak.
    pub(crate) fn record_success(&self) -> bool {
        let mut state = self.0.write();
        let now = Utc::now();
        let recovered = state.consecutive_failures > 0;
        state.consecutive_failures = 0;
        state.stream_visible = true;
        state.last_success = Some(now);
        state.last_check = Some(now);
        state.last_error = None;
        recovered
    }

    /// Returns the failure streak including this one.
    pub(crate) fn record_failure(&self, error: &str) -> u32 {
        let mut state = self.0.write();
        state.consecutive_failures += 1;
        state.stream_visible = false;
        state.last_check = Some(Utc::now());
        state.last_error = Some(error.to_string());
        state.consecutive_failures
    }

    pub(crate) fn reset_after_restart(&self, restarted: bool) {
        let mut state = self.0.write();
        state.consecutive_failures = 0;
        if restarted {
            state.restarts_triggered += 1;
        }
    }

    /// Nothing to check while the backend is down; a new instance starts with a clean streak.
    pub(crate) fn mark_paused(&self) {
        let mut state = self.0.write();
        state.consecutive_failures = 0;
        state.stream_visible = false;
    }
}
