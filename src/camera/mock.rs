use super::backend::{Backend, BackendInfo, BackendKind};
use crate::error::StartError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

/// Counters shared by a mock backend and all of its replacements.
#[derive(Debug, Default)]
pub struct MockShared {
    pub starts: AtomicU32,
    pub stops: AtomicU32,
    pub instances: AtomicU32,
    pub active: AtomicU32,
    pub max_active: AtomicU32,
    /// Number of upcoming start attempts that fail with DeviceNotFound
    pub failing_starts: AtomicU32,
    /// Makes the currently running instance look dead
    pub crashed: AtomicBool,
}

impl MockShared {
    pub fn starts(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn crash(&self) {
        self.crashed.store(true, Ordering::SeqCst);
    }
}

/// Process-free backend for exercising supervision logic.
pub struct MockBackend {
    shared: Arc<MockShared>,
    kind: BackendKind,
    instance: u32,
    running: bool,
    started_at: Option<SystemTime>,
}

impl MockBackend {
    pub fn new() -> (Self, Arc<MockShared>) {
        Self::with_kind(BackendKind::Usb)
    }

    /// Behaves like the null backend: start succeeds but nothing runs.
    pub fn idle() -> (Self, Arc<MockShared>) {
        Self::with_kind(BackendKind::Null)
    }

    fn with_kind(kind: BackendKind) -> (Self, Arc<MockShared>) {
        let shared = Arc::new(MockShared::default());
        (Self::instance_of(Arc::clone(&shared), kind), shared)
    }

    fn instance_of(shared: Arc<MockShared>, kind: BackendKind) -> Self {
        let instance = shared.instances.fetch_add(1, Ordering::SeqCst) + 1;
        Self {
            shared,
            kind,
            instance,
            running: false,
            started_at: None,
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn start(&mut self) -> Result<(), StartError> {
        self.shared.starts.fetch_add(1, Ordering::SeqCst);

        let pending_failures = self.shared.failing_starts.load(Ordering::SeqCst);
        if pending_failures > 0 {
            self.shared
                .failing_starts
                .store(pending_failures - 1, Ordering::SeqCst);
            return Err(StartError::DeviceNotFound {
                device: PathBuf::from("/dev/video-mock"),
            });
        }

        if self.kind == BackendKind::Null {
            return Ok(());
        }

        // Give concurrent callers a chance to interleave
        tokio::task::yield_now().await;

        self.shared.crashed.store(false, Ordering::SeqCst);
        let active = self.shared.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.max_active.fetch_max(active, Ordering::SeqCst);
        self.running = true;
        self.started_at = Some(SystemTime::now());
        Ok(())
    }

    async fn stop(&mut self) {
        self.shared.stops.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.running {
            self.running = false;
            self.shared.active.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_alive(&mut self) -> bool {
        if !self.running {
            return false;
        }
        if self.shared.crashed.load(Ordering::SeqCst) {
            self.running = false;
            self.shared.active.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn describe(&self) -> BackendInfo {
        BackendInfo {
            kind: self.kind,
            name: format!("mock camera #{}", self.instance),
            rtsp_url: Some("rtsp://127.0.0.1:8554/camera".to_string()),
            device: None,
            pids: Vec::new(),
            last_frame_at: self.started_at,
            last_exit: None,
        }
    }

    fn replacement(&self) -> Self {
        Self::instance_of(Arc::clone(&self.shared), self.kind)
    }
}
