use super::shutdown::ShutdownCoordinator;
use super::state::Component;
use super::types::{ComponentState, ShutdownReason};
use crate::camera::{Backend, BackendFactory, BackendInfo, CameraBackend};
use crate::config::CamkeeperConfig;
use crate::error::Result;
use crate::health::HealthAggregator;
use crate::shutdown::ShutdownSignal;
use crate::supervisor::Supervisor;
use crate::watchdog::{HttpRelayProbe, SharedWatchdogState, StreamWatchdog, WatchdogState};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

pub(super) type RelayWatchdog<B> = StreamWatchdog<HttpRelayProbe, Supervisor<B>>;

/// Wires the supervisor, watchdog and health server around one backend
pub struct CamkeeperOrchestrator<B: Backend = CameraBackend> {
    pub(super) config: CamkeeperConfig,
    pub(super) supervisor: Supervisor<B>,
    pub(super) watchdog: Option<Arc<RelayWatchdog<B>>>,
    pub(super) watchdog_state: SharedWatchdogState,
    pub(super) aggregator: HealthAggregator,
    pub(super) coordinator: ShutdownCoordinator<B>,
    pub(super) shutdown: ShutdownSignal,

    // Lifecycle management
    pub(super) tasks: Vec<(Component, JoinHandle<()>)>,
    pub(super) component_states: Arc<RwLock<HashMap<Component, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
}

impl CamkeeperOrchestrator<CameraBackend> {
    /// Validate the configuration and select a backend for it.
    ///
    /// Fails only on configuration errors; a backend that cannot start yet is
    /// left to the supervisor's retry loop.
    pub fn new(config: CamkeeperConfig) -> Result<Self> {
        config.validate()?;
        let backend = BackendFactory::new().create(&config.camera)?;
        Self::with_backend(config, backend)
    }
}

impl<B: Backend> CamkeeperOrchestrator<B> {
    pub fn with_backend(config: CamkeeperConfig, backend: B) -> Result<Self> {
        let shutdown = ShutdownSignal::new();
        let supervisor = Supervisor::new(backend, config.supervisor.clone(), shutdown.clone());
        let stream_path = config.stream_path();

        let watchdog = if config.watchdog.enabled {
            let probe = HttpRelayProbe::new(
                &config.relay.api_url,
                &stream_path,
                config.relay.request_timeout(),
            )?;
            Some(Arc::new(StreamWatchdog::new(
                &config.watchdog,
                &stream_path,
                probe,
                supervisor.clone(),
                shutdown.clone(),
            )))
        } else {
            None
        };

        let watchdog_state = match &watchdog {
            Some(watchdog) => watchdog.state(),
            None => SharedWatchdogState::new(WatchdogState::new(
                &config.relay.api_url,
                &stream_path,
                config.watchdog.check_interval_secs,
                config.watchdog.failure_threshold,
            )),
        };

        let aggregator = HealthAggregator::new(supervisor.status(), watchdog_state.clone());
        let coordinator = ShutdownCoordinator::new(
            shutdown.clone(),
            supervisor.clone(),
            config.supervisor.shutdown_timeout(),
        );
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        let info = supervisor.status().snapshot().info;
        info!("Using {} backend '{}'", info.kind, info.name);

        Ok(Self {
            config,
            supervisor,
            watchdog,
            watchdog_state,
            aggregator,
            coordinator,
            shutdown,
            tasks: Vec::new(),
            component_states: Arc::new(RwLock::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
        })
    }

    pub fn config(&self) -> &CamkeeperConfig {
        &self.config
    }

    pub fn backend_info(&self) -> BackendInfo {
        self.supervisor.status().snapshot().info
    }

    pub fn supervisor(&self) -> &Supervisor<B> {
        &self.supervisor
    }

    pub fn aggregator(&self) -> HealthAggregator {
        self.aggregator.clone()
    }

    pub fn watchdog_state(&self) -> SharedWatchdogState {
        self.watchdog_state.clone()
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }
}
