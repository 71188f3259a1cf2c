mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use orchestrator::CamkeeperOrchestrator;
pub use shutdown::ShutdownCoordinator;
pub use state::Component;
pub use types::{ComponentState, ShutdownOutcome, ShutdownReason};
