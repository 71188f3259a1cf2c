use crate::camera::BackendInfo;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Supervisor lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    Stopped,
    Starting,
    Running,
    /// Started successfully but owns no process to watch
    Idle,
    CrashDetected,
    StopRequested,
}

/// Last committed view of the supervised backend.
#[derive(Debug, Clone)]
pub struct BackendStatus {
    pub state: SupervisorState,
    pub running: bool,
    pub info: BackendInfo,
    /// When the current backend instance came up
    pub started_at: Option<Instant>,
    pub restarts: u64,
    pub crashes: u64,
    pub forced_restarts: u64,
    pub last_error: Option<String>,
}

impl BackendStatus {
    pub fn new(info: BackendInfo) -> Self {
        Self {
            state: SupervisorState::Stopped,
            running: false,
            info,
            started_at: None,
            restarts: 0,
            crashes: 0,
            forced_restarts: 0,
            last_error: None,
        }
    }

    /// Time since the running backend started; zero when nothing runs.
    pub fn uptime(&self) -> Duration {
        match self.started_at {
            Some(started_at) if self.running => started_at.elapsed(),
            _ => Duration::ZERO,
        }
    }
}

/// Read-mostly handle on [`BackendStatus`]. Reads never wait on a restart.
#[derive(Debug, Clone)]
pub struct SharedStatus(Arc<RwLock<BackendStatus>>);

impl SharedStatus {
    pub fn new(status: BackendStatus) -> Self {
        Self(Arc::new(RwLock::new(status)))
    }

    pub fn snapshot(&self) -> BackendStatus {
        self.0.read().clone()
    }

    pub fn state(&self) -> SupervisorState {
        self.0.read().state
    }

    pub fn is_running(&self) -> bool {
        self.0.read().running
    }

    pub(crate) fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut BackendStatus),
    {
        f(&mut self.0.write());
    }
}
