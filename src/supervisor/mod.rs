mod runner;
mod state;
#[cfg(test)]
mod tests;

pub use runner::Supervisor;
pub use state::{BackendStatus, SharedStatus, SupervisorState};
