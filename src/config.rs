use crate::error::{CamkeeperError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CamkeeperConfig {
    pub camera: CameraConfig,
    pub relay: RelayConfig,
    pub watchdog: WatchdogConfig,
    pub supervisor: SupervisorConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Backend selection: auto, none, usb or pi
    #[serde(default = "default_camera_kind")]
    pub kind: String,

    /// V4L2 device file used by the USB backend and by auto-detection
    #[serde(default = "default_camera_device")]
    pub device: String,

    /// Capture resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Frames per second
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// Encoder bitrate in bits per second
    #[serde(default = "default_camera_bitrate")]
    pub bitrate: u32,

    /// RTSP URL the encoder publishes to
    #[serde(default = "default_rtsp_url")]
    pub rtsp_url: String,

    /// CSI capture helper (Pi backend)
    #[serde(default = "default_capture_binary")]
    pub capture_binary: String,

    /// Encoder/publisher binary
    #[serde(default = "default_encoder_binary")]
    pub encoder_binary: String,

    /// Seconds between SIGTERM and SIGKILL when stopping a child
    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RelayConfig {
    /// Base URL of the relay control API
    #[serde(default = "default_relay_api_url")]
    pub api_url: String,

    /// Path name checked on the relay; derived from the RTSP URL when unset
    #[serde(default)]
    pub stream_path: Option<String>,

    /// Per-request timeout for the control API
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchdogConfig {
    #[serde(default = "default_watchdog_enabled")]
    pub enabled: bool,

    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Consecutive failed checks before a forced restart
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SupervisorConfig {
    /// Liveness poll interval while the backend is running
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Delay before retrying a failed start
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Pause between crash cleanup and the next start
    #[serde(default = "default_crash_cooldown_secs")]
    pub crash_cooldown_secs: u64,

    /// Upper bound on backend teardown during shutdown
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_server_enabled")]
    pub enabled: bool,

    /// IP address to bind to
    #[serde(default = "default_server_ip")]
    pub ip: String,

    /// Port to listen on
    #[serde(default = "default_server_port")]
    pub port: u16,
}

/// Requested backend, as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraKind {
    Auto,
    None,
    Usb,
    Pi,
}

impl FromStr for CameraKind {
    type Err = CamkeeperError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(CameraKind::Auto),
            "none" => Ok(CameraKind::None),
            "usb" => Ok(CameraKind::Usb),
            "pi" => Ok(CameraKind::Pi),
            other => Err(CamkeeperError::invalid_config(format!(
                "unknown camera kind '{}' (expected auto, none, usb or pi)",
                other
            ))),
        }
    }
}

impl fmt::Display for CameraKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CameraKind::Auto => "auto",
            CameraKind::None => "none",
            CameraKind::Usb => "usb",
            CameraKind::Pi => "pi",
        };
        f.write_str(name)
    }
}

impl CameraConfig {
    pub fn kind(&self) -> Result<CameraKind> {
        self.kind.parse()
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }
}

impl RelayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl WatchdogConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

impl SupervisorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn crash_cooldown(&self) -> Duration {
        Duration::from_secs(self.crash_cooldown_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl CamkeeperConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.kind", default_camera_kind())?
            .set_default("camera.device", default_camera_device())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default("camera.bitrate", default_camera_bitrate())?
            .set_default("camera.rtsp_url", default_rtsp_url())?
            .set_default("camera.capture_binary", default_capture_binary())?
            .set_default("camera.encoder_binary", default_encoder_binary())?
            .set_default("camera.stop_grace_secs", default_stop_grace_secs())?
            .set_default("relay.api_url", default_relay_api_url())?
            .set_default("relay.request_timeout_ms", default_request_timeout_ms())?
            .set_default("watchdog.enabled", default_watchdog_enabled())?
            .set_default(
                "watchdog.check_interval_secs",
                default_check_interval_secs(),
            )?
            .set_default("watchdog.failure_threshold", default_failure_threshold())?
            .set_default(
                "supervisor.poll_interval_secs",
                default_poll_interval_secs(),
            )?
            .set_default("supervisor.retry_delay_secs", default_retry_delay_secs())?
            .set_default(
                "supervisor.crash_cooldown_secs",
                default_crash_cooldown_secs(),
            )?
            .set_default(
                "supervisor.shutdown_timeout_secs",
                default_shutdown_timeout_secs(),
            )?
            .set_default("server.enabled", default_server_enabled())?
            .set_default("server.ip", default_server_ip())?
            .set_default("server.port", default_server_port())?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // CAMKEEPER_CAMERA__KIND=usb, CAMKEEPER_SERVER__PORT=9000, ...
            .add_source(
                Environment::with_prefix("CAMKEEPER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            // Variables understood by existing deployments
            .set_override_option("camera.kind", std::env::var("CAMERA_TYPE").ok())?
            .set_override_option("camera.device", std::env::var("CAMERA_DEVICE").ok())?
            .build()?;

        let config: CamkeeperConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(CamkeeperError::invalid_config(
                "Camera resolution must be greater than 0",
            ));
        }

        if self.camera.fps == 0 {
            return Err(CamkeeperError::invalid_config(
                "Camera fps must be greater than 0",
            ));
        }

        if self.camera.bitrate == 0 {
            return Err(CamkeeperError::invalid_config(
                "Camera bitrate must be greater than 0",
            ));
        }

        self.camera.kind()?;

        if self.relay.api_url.trim().is_empty() {
            return Err(CamkeeperError::invalid_config(
                "Relay API URL must not be empty",
            ));
        }

        if self.relay.request_timeout_ms == 0 {
            return Err(CamkeeperError::invalid_config(
                "Relay request timeout must be greater than 0",
            ));
        }

        if self.watchdog.enabled && self.stream_path().is_empty() {
            return Err(CamkeeperError::invalid_config(
                "Stream path is empty; set relay.stream_path or give camera.rtsp_url a path",
            ));
        }

        if self.watchdog.check_interval_secs == 0 {
            return Err(CamkeeperError::invalid_config(
                "Watchdog check interval must be greater than 0",
            ));
        }

        if self.watchdog.failure_threshold == 0 {
            return Err(CamkeeperError::invalid_config(
                "Watchdog failure threshold must be greater than 0",
            ));
        }

        if self.supervisor.poll_interval_secs == 0 {
            return Err(CamkeeperError::invalid_config(
                "Supervisor poll interval must be greater than 0",
            ));
        }

        if self.supervisor.shutdown_timeout_secs == 0 {
            return Err(CamkeeperError::invalid_config(
                "Supervisor shutdown timeout must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Relay path name the watchdog looks for
    pub fn stream_path(&self) -> String {
        match self.relay.stream_path.as_deref().map(str::trim) {
            Some(path) if !path.is_empty() => path.trim_matches('/').to_string(),
            _ => stream_path_from_url(&self.camera.rtsp_url),
        }
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// "rtsp://127.0.0.1:8554/camera" -> "camera"
fn stream_path_from_url(url: &str) -> String {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    without_scheme
        .split_once('/')
        .and_then(|(_, path)| path.split(['?', '#']).next())
        .map(|path| path.trim_matches('/').to_string())
        .unwrap_or_default()
}

impl Default for CamkeeperConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                kind: default_camera_kind(),
                device: default_camera_device(),
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
                bitrate: default_camera_bitrate(),
                rtsp_url: default_rtsp_url(),
                capture_binary: default_capture_binary(),
                encoder_binary: default_encoder_binary(),
                stop_grace_secs: default_stop_grace_secs(),
            },
            relay: RelayConfig {
                api_url: default_relay_api_url(),
                stream_path: None,
                request_timeout_ms: default_request_timeout_ms(),
            },
            watchdog: WatchdogConfig {
                enabled: default_watchdog_enabled(),
                check_interval_secs: default_check_interval_secs(),
                failure_threshold: default_failure_threshold(),
            },
            supervisor: SupervisorConfig {
                poll_interval_secs: default_poll_interval_secs(),
                retry_delay_secs: default_retry_delay_secs(),
                crash_cooldown_secs: default_crash_cooldown_secs(),
                shutdown_timeout_secs: default_shutdown_timeout_secs(),
            },
            server: ServerConfig {
                enabled: default_server_enabled(),
                ip: default_server_ip(),
                port: default_server_port(),
            },
        }
    }
}

// Default value functions
fn default_camera_kind() -> String {
    "auto".to_string()
}
fn default_camera_device() -> String {
    "/dev/video0".to_string()
}
fn default_camera_resolution() -> (u32, u32) {
    (1280, 720)
}
fn default_camera_fps() -> u32 {
    20
}
fn default_camera_bitrate() -> u32 {
    6_000_000
}
fn default_rtsp_url() -> String {
    "rtsp://127.0.0.1:8554/camera".to_string()
}
fn default_capture_binary() -> String {
    "libcamera-vid".to_string()
}
fn default_encoder_binary() -> String {
    "ffmpeg".to_string()
}
fn default_stop_grace_secs() -> u64 {
    3
}

fn default_relay_api_url() -> String {
    "http://127.0.0.1:9997/v2".to_string()
}
fn default_request_timeout_ms() -> u64 {
    2000
}

fn default_watchdog_enabled() -> bool {
    true
}
fn default_check_interval_secs() -> u64 {
    5
}
fn default_failure_threshold() -> u32 {
    3
}

fn default_poll_interval_secs() -> u64 {
    2
}
fn default_retry_delay_secs() -> u64 {
    5
}
fn default_crash_cooldown_secs() -> u64 {
    2
}
fn default_shutdown_timeout_secs() -> u64 {
    10
}

fn default_server_enabled() -> bool {
    true
}
fn default_server_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_server_port() -> u16 {
    9188
}
