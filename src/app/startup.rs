use super::state::Component;
use super::{CamkeeperOrchestrator, ComponentState};
use crate::camera::Backend;
use crate::error::{CamkeeperError, Result};
use std::sync::Arc;
use tracing::info;

#[cfg(feature = "http")]
use crate::server::HealthServer;
#[cfg(feature = "http")]
use tracing::error;

impl<B: Backend> CamkeeperOrchestrator<B> {
    /// Spawn the supervisor, watchdog and health server tasks
    pub async fn start(&mut self) -> Result<()> {
        if !self.tasks.is_empty() {
            return Err(CamkeeperError::system("Orchestrator already started"));
        }

        info!("Starting camkeeper");

        // Supervisor first so the backend is starting before anything reports on it
        self.set_component_state(Component::Supervisor, ComponentState::Starting);
        let supervisor = self.supervisor.clone();
        let handle = tokio::spawn(async move { supervisor.run().await });
        self.tasks.push((Component::Supervisor, handle));
        self.set_component_state(Component::Supervisor, ComponentState::Running);

        if let Some(watchdog) = &self.watchdog {
            self.set_component_state(Component::Watchdog, ComponentState::Starting);
            let watchdog = Arc::clone(watchdog);
            let handle = tokio::spawn(async move { watchdog.run().await });
            self.tasks.push((Component::Watchdog, handle));
            self.set_component_state(Component::Watchdog, ComponentState::Running);
        } else {
            info!("Stream watchdog disabled");
        }

        #[cfg(feature = "http")]
        if self.config.server.enabled {
            self.set_component_state(Component::Server, ComponentState::Starting);

            let server = HealthServer::new(self.config.server.clone(), self.aggregator.clone());
            let shutdown = self.shutdown.clone();
            let states = Arc::clone(&self.component_states);
            let handle = tokio::spawn(async move {
                if let Err(e) = server.start(shutdown).await {
                    error!("Health server error: {}", e);
                    states
                        .write()
                        .insert(Component::Server, ComponentState::Failed);
                }
            });
            self.tasks.push((Component::Server, handle));
            self.set_component_state(Component::Server, ComponentState::Running);

            info!(
                "Health server started on {}:{}",
                self.config.server.ip, self.config.server.port
            );
        }

        info!("camkeeper started");
        Ok(())
    }
}
