use super::backend::CameraBackend;
use super::probe::{DeviceProbe, SystemProbe};
use crate::config::{CameraConfig, CameraKind};
use crate::error::{CamkeeperError, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Chooses the backend variant for a configuration.
pub struct BackendFactory<P: DeviceProbe = SystemProbe> {
    probe: P,
}

impl BackendFactory<SystemProbe> {
    pub fn new() -> Self {
        Self { probe: SystemProbe }
    }
}

impl Default for BackendFactory<SystemProbe> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: DeviceProbe> BackendFactory<P> {
    pub fn with_probe(probe: P) -> Self {
        Self { probe }
    }

    /// Build the backend for `config`.
    ///
    /// An unknown kind, or `pi` without the capture helper installed, is a
    /// configuration error. In `auto` mode a USB device is preferred over the
    /// CSI helper, and the null backend is the last resort.
    pub fn create(&self, config: &CameraConfig) -> Result<CameraBackend> {
        let kind = config.kind()?;
        info!("Selecting camera backend (camera.kind = {})", kind);

        let shared = Arc::new(config.clone());

        match kind {
            CameraKind::None => Ok(CameraBackend::null(shared)),
            CameraKind::Usb => Ok(CameraBackend::usb(shared)),
            CameraKind::Pi => {
                if self.probe.find_binary(&config.capture_binary).is_none() {
                    return Err(CamkeeperError::invalid_config(format!(
                        "camera.kind is pi but '{}' is not installed",
                        config.capture_binary
                    )));
                }
                Ok(CameraBackend::pi(shared))
            }
            CameraKind::Auto => {
                if self.probe.device_exists(Path::new(&config.device)) {
                    info!("USB camera detected at {}", config.device);
                    Ok(CameraBackend::usb(shared))
                } else if self.probe.find_binary(&config.capture_binary).is_some() {
                    info!("Pi camera helper {} detected", config.capture_binary);
                    Ok(CameraBackend::pi(shared))
                } else {
                    info!("No camera detected, running in null mode");
                    Ok(CameraBackend::null(shared))
                }
            }
        }
    }
}
