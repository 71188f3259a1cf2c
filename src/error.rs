use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CamkeeperError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Backend start failed: {0}")]
    Start(#[from] StartError),

    #[error("Stream visibility probe failed: {0}")]
    Probe(#[from] ProbeError),

    #[error("Capture process for {backend} exited unexpectedly ({status})")]
    ProcessCrash { backend: String, status: String },

    #[error("Backend teardown did not finish within {timeout:?}")]
    ShutdownTimeout { timeout: Duration },

    #[error("Failed to bind health server to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("System error: {message}")]
    System { message: String },
}

/// Reasons a backend could not bring its capture pipeline up.
#[derive(Error, Debug)]
pub enum StartError {
    #[error("capture device {} not found", device.display())]
    DeviceNotFound { device: PathBuf },

    #[error("required binary '{binary}' is not installed")]
    BinaryMissing { binary: String },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// A failed visibility check against the relay control API.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("relay API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("relay API returned HTTP {0}")]
    Status(u16),

    #[error("stream path '{path}' is not published on the relay")]
    PathMissing { path: String },

    #[error("stream path '{path}' has no ready source")]
    NotReady { path: String },
}

impl CamkeeperError {
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    /// Configuration problems abort startup; everything else is retried or absorbed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            CamkeeperError::Config(_) | CamkeeperError::InvalidConfig { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CamkeeperError>;
