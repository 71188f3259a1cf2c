mod monitor;
mod relay;
mod state;

pub use monitor::{CheckOutcome, RestartTarget, StreamWatchdog};
pub use relay::{HttpRelayProbe, PathItem, PathList, RelayProbe};
pub use state::{SharedWatchdogState, WatchdogState};
