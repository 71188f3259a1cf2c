mod backend;
mod command;
mod factory;
#[cfg(test)]
pub(crate) mod mock;
mod probe;
mod process;
#[cfg(test)]
mod tests;

pub use backend::{Backend, BackendInfo, BackendKind, CameraBackend};
pub use command::{pi_pipeline, usb_pipeline, CommandSpec};
pub use factory::BackendFactory;
pub use probe::{find_executable, DeviceProbe, SystemProbe};
pub use process::CaptureProcess;
