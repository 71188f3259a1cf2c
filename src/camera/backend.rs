use super::command::{self, CommandSpec};
use super::probe::find_executable;
use super::process::CaptureProcess;
use crate::config::CameraConfig;
use crate::error::StartError;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Capture strategy of a backend instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BackendKind {
    #[serde(rename = "pi")]
    Pi,
    #[serde(rename = "usb")]
    Usb,
    #[serde(rename = "none")]
    Null,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Pi => "pi",
            BackendKind::Usb => "usb",
            BackendKind::Null => "none",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata a backend reports about itself.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendInfo {
    pub kind: BackendKind,
    pub name: String,
    pub rtsp_url: Option<String>,
    pub device: Option<String>,
    pub pids: Vec<u32>,
    /// Set when the backend starts; no in-band frame inspection is done
    pub last_frame_at: Option<SystemTime>,
    /// How the previous pipeline ended, if it died on its own
    pub last_exit: Option<String>,
}

/// Capability set the supervisor drives.
#[async_trait]
pub trait Backend: Send + 'static {
    /// Launch the capture pipeline.
    async fn start(&mut self) -> Result<(), StartError>;

    /// Best-effort, idempotent teardown.
    async fn stop(&mut self);

    /// Non-blocking check that the owned process still exists.
    /// Marks the backend as not running once death is observed.
    fn is_alive(&mut self) -> bool;

    fn is_running(&self) -> bool;

    fn describe(&self) -> BackendInfo;

    /// A fresh, never-started instance built from the same configuration.
    fn replacement(&self) -> Self
    where
        Self: Sized;
}

/// Camera backend owning the child processes of one capture pipeline.
pub struct CameraBackend {
    kind: BackendKind,
    config: Arc<CameraConfig>,
    process: Option<CaptureProcess>,
    running: bool,
    last_frame_at: Option<SystemTime>,
    last_exit: Option<String>,
}

impl CameraBackend {
    fn new(kind: BackendKind, config: Arc<CameraConfig>) -> Self {
        Self {
            kind,
            config,
            process: None,
            running: false,
            last_frame_at: None,
            last_exit: None,
        }
    }

    /// CSI camera through the capture helper
    pub fn pi(config: Arc<CameraConfig>) -> Self {
        Self::new(BackendKind::Pi, config)
    }

    /// V4L2 camera; the device is only checked on start
    pub fn usb(config: Arc<CameraConfig>) -> Self {
        Self::new(BackendKind::Usb, config)
    }

    /// Stand-in used when no camera is available. Never owns a process.
    pub fn null(config: Arc<CameraConfig>) -> Self {
        Self::new(BackendKind::Null, config)
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    fn display_name(&self) -> String {
        match self.kind {
            BackendKind::Pi => "Raspberry Pi camera".to_string(),
            BackendKind::Usb => format!("USB camera ({})", self.config.device),
            BackendKind::Null => "No camera".to_string(),
        }
    }

    /// Command lines for this variant, after checking its prerequisites.
    pub fn pipeline(&self) -> Result<Vec<CommandSpec>, StartError> {
        match self.kind {
            BackendKind::Usb => {
                let device = Path::new(&self.config.device);
                if !device.exists() {
                    return Err(StartError::DeviceNotFound {
                        device: device.to_path_buf(),
                    });
                }
                require_binary(&self.config.encoder_binary)?;
                Ok(command::usb_pipeline(&self.config))
            }
            BackendKind::Pi => {
                require_binary(&self.config.capture_binary)?;
                require_binary(&self.config.encoder_binary)?;
                Ok(command::pi_pipeline(&self.config))
            }
            BackendKind::Null => Ok(Vec::new()),
        }
    }
}

fn require_binary(name: &str) -> Result<PathBuf, StartError> {
    find_executable(name).ok_or_else(|| StartError::BinaryMissing {
        binary: name.to_string(),
    })
}

#[async_trait]
impl Backend for CameraBackend {
    async fn start(&mut self) -> Result<(), StartError> {
        if self.running {
            debug!("{} is already running", self.display_name());
            return Ok(());
        }

        let stages = self.pipeline()?;
        if stages.is_empty() {
            info!("No camera mode enabled; nothing will be captured");
            self.running = false;
            return Ok(());
        }

        for stage in &stages {
            info!("Launching: {}", stage);
        }

        let process = CaptureProcess::spawn(&stages)?;
        info!(
            "{} started, publishing to {} (pids {:?})",
            self.display_name(),
            self.config.rtsp_url,
            process.pids()
        );

        self.process = Some(process);
        self.running = true;
        self.last_frame_at = Some(SystemTime::now());
        self.last_exit = None;

        Ok(())
    }

    async fn stop(&mut self) {
        self.running = false;

        let Some(mut process) = self.process.take() else {
            debug!("{} is not running, nothing to stop", self.display_name());
            return;
        };

        info!("Stopping {}", self.display_name());
        process.terminate(self.config.stop_grace()).await;
    }

    fn is_alive(&mut self) -> bool {
        let Some(process) = self.process.as_mut() else {
            return false;
        };

        match process.poll_exit() {
            None => true,
            Some(exit) => {
                warn!("{}: {}", self.display_name(), exit);
                self.running = false;
                self.last_exit = Some(exit);
                false
            }
        }
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn describe(&self) -> BackendInfo {
        let captures = self.kind != BackendKind::Null;

        BackendInfo {
            kind: self.kind,
            name: self.display_name(),
            rtsp_url: captures.then(|| self.config.rtsp_url.clone()),
            device: (self.kind == BackendKind::Usb).then(|| self.config.device.clone()),
            pids: self
                .process
                .as_ref()
                .map(CaptureProcess::pids)
                .unwrap_or_default(),
            last_frame_at: self.last_frame_at,
            last_exit: self.last_exit.clone(),
        }
    }

    fn replacement(&self) -> Self {
        Self::new(self.kind, Arc::clone(&self.config))
    }
}
