use super::{CamkeeperOrchestrator, ComponentState};
use crate::camera::Backend;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Long-running tasks spawned by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Supervisor,
    Watchdog,
    Server,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Supervisor => "supervisor",
            Component::Watchdog => "watchdog",
            Component::Server => "server",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<B: Backend> CamkeeperOrchestrator<B> {
    pub fn set_component_state(&self, component: Component, state: ComponentState) {
        debug!("Component '{}' state changed to: {:?}", component, state);
        self.component_states.write().insert(component, state);
    }

    pub fn component_state(&self, component: Component) -> Option<ComponentState> {
        self.component_states.read().get(&component).cloned()
    }
}
