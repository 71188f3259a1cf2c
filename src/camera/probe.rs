use std::path::{Path, PathBuf};

/// Environment probing used to pick a backend.
pub trait DeviceProbe: Send + Sync {
    fn device_exists(&self, path: &Path) -> bool;

    fn find_binary(&self, name: &str) -> Option<PathBuf>;
}

/// Probes the real filesystem and `PATH`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl DeviceProbe for SystemProbe {
    fn device_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn find_binary(&self, name: &str) -> Option<PathBuf> {
        find_executable(name)
    }
}

/// Resolve `name` like a shell would: as given when it contains a separator,
/// otherwise against each `PATH` entry.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }

    if name.contains(std::path::MAIN_SEPARATOR) {
        let candidate = PathBuf::from(name);
        return is_executable(&candidate).then_some(candidate);
    }

    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
