pub mod app;
pub mod camera;
pub mod config;
pub mod error;
pub mod health;
pub mod shutdown;
pub mod supervisor;
pub mod watchdog;

#[cfg(feature = "http")]
pub mod server;

pub use app::{
    CamkeeperOrchestrator, Component, ComponentState, ShutdownCoordinator, ShutdownOutcome,
    ShutdownReason,
};
pub use camera::{Backend, BackendFactory, BackendInfo, BackendKind, CameraBackend};
pub use config::{CameraKind, CamkeeperConfig};
pub use error::{CamkeeperError, ProbeError, Result, StartError};
pub use health::{HealthAggregator, HealthDetails, HealthSnapshot};
pub use shutdown::ShutdownSignal;
pub use supervisor::{BackendStatus, SharedStatus, Supervisor, SupervisorState};
pub use watchdog::{HttpRelayProbe, RelayProbe, RestartTarget, StreamWatchdog, WatchdogState};

#[cfg(feature = "http")]
pub use server::HealthServer;
