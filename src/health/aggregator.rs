use crate::camera::BackendKind;
use crate::supervisor::{BackendStatus, SharedStatus, SupervisorState};
use crate::watchdog::{SharedWatchdogState, WatchdogState};
use serde::Serialize;
use std::time::{Duration, SystemTime};

/// A backend must have been up longer than this to count as healthy.
pub const HEALTH_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub running: bool,
    pub stream_visible: bool,
    pub camera_name: String,
    pub backend_kind: BackendKind,
    /// Whole seconds since the current backend instance started
    pub uptime: u64,
    #[serde(skip)]
    pub healthy: bool,
}

/// Body of `GET /health/details`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthDetails {
    #[serde(flatten)]
    pub snapshot: HealthSnapshot,
    pub healthy: bool,
    pub state: SupervisorState,
    pub restarts: u64,
    pub crashes: u64,
    pub forced_restarts: u64,
    pub last_error: Option<String>,
    pub last_frame_seconds_ago: Option<u64>,
    pub rtsp_url: Option<String>,
    pub device: Option<String>,
    pub pids: Vec<u32>,
    pub watchdog: WatchdogState,
}

/// Combines supervisor and watchdog state into reportable health.
///
/// Only reads cached state, so it never probes the relay or waits on a restart.
#[derive(Debug, Clone)]
pub struct HealthAggregator {
    status: SharedStatus,
    watchdog: SharedWatchdogState,
}

impl HealthAggregator {
    pub fn new(status: SharedStatus, watchdog: SharedWatchdogState) -> Self {
        Self { status, watchdog }
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        self.snapshot_of(&self.status.snapshot())
    }

    fn snapshot_of(&self, status: &BackendStatus) -> HealthSnapshot {
        let uptime = status.uptime();

        HealthSnapshot {
            running: status.running,
            stream_visible: self.watchdog.stream_visible(),
            camera_name: status.info.name.clone(),
            backend_kind: status.info.kind,
            uptime: uptime.as_secs(),
            healthy: status.running && uptime > HEALTH_GRACE_PERIOD,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.snapshot().healthy
    }

    pub fn details(&self) -> HealthDetails {
        let status = self.status.snapshot();
        let snapshot = self.snapshot_of(&status);
        let last_frame_seconds_ago = status.info.last_frame_at.and_then(|at| {
            SystemTime::now()
                .duration_since(at)
                .ok()
                .map(|age| age.as_secs())
        });

        HealthDetails {
            healthy: snapshot.healthy,
            snapshot,
            state: status.state,
            restarts: status.restarts,
            crashes: status.crashes,
            forced_restarts: status.forced_restarts,
            last_error: status.last_error,
            last_frame_seconds_ago,
            rtsp_url: status.info.rtsp_url,
            device: status.info.device,
            pids: status.info.pids,
            watchdog: self.watchdog.snapshot(),
        }
    }
}
