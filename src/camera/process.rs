use super::command::CommandSpec;
use crate::error::StartError;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

struct Stage {
    program: String,
    child: Child,
}

/// Child processes chained stdout -> stdin and owned as a unit.
///
/// Dropping a `CaptureProcess` kills every stage that is still running.
pub struct CaptureProcess {
    stages: Vec<Stage>,
}

impl CaptureProcess {
    /// Spawn every stage in order, wiring each stage's stdout into the next one's stdin.
    pub fn spawn(specs: &[CommandSpec]) -> Result<Self, StartError> {
        let mut stages: Vec<Stage> = Vec::with_capacity(specs.len());
        let mut upstream: Option<Stdio> = None;

        for (index, spec) in specs.iter().enumerate() {
            let last = index + 1 == specs.len();

            let mut command = Command::new(&spec.program);
            command.args(&spec.args).kill_on_drop(true);
            command.stdin(upstream.take().unwrap_or_else(Stdio::null));
            if !last {
                command.stdout(Stdio::piped());
            }

            // Stages spawned so far are killed on drop if this one fails
            let mut child = command.spawn().map_err(|source| StartError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

            if !last {
                if let Some(stdout) = child.stdout.take() {
                    let stdio: Stdio = stdout.try_into().map_err(|source| StartError::Spawn {
                        program: spec.program.clone(),
                        source,
                    })?;
                    upstream = Some(stdio);
                }
            }

            debug!(
                "Spawned pipeline stage {} (pid {:?})",
                spec.program,
                child.id()
            );

            stages.push(Stage {
                program: spec.program.clone(),
                child,
            });
        }

        Ok(Self { stages })
    }

    pub fn pids(&self) -> Vec<u32> {
        self.stages.iter().filter_map(|stage| stage.child.id()).collect()
    }

    /// Non-blocking. Returns a description of the first stage found to have exited.
    pub fn poll_exit(&mut self) -> Option<String> {
        for stage in &mut self.stages {
            match stage.child.try_wait() {
                Ok(None) => {}
                Ok(Some(status)) => return Some(format!("{} exited with {}", stage.program, status)),
                Err(e) => return Some(format!("{} could not be polled: {}", stage.program, e)),
            }
        }
        None
    }

    pub fn is_alive(&mut self) -> bool {
        self.poll_exit().is_none()
    }

    /// SIGTERM every stage, then SIGKILL whatever is still around after `grace`.
    /// Failures are logged and otherwise ignored.
    pub async fn terminate(&mut self, grace: Duration) {
        for stage in &mut self.stages {
            request_termination(stage);
        }

        for stage in &mut self.stages {
            match timeout(grace, stage.child.wait()).await {
                Ok(Ok(status)) => {
                    debug!("{} exited with {}", stage.program, status);
                }
                Ok(Err(e)) => {
                    warn!("Error waiting for {} to exit: {}", stage.program, e);
                }
                Err(_) => {
                    warn!(
                        "{} ignored SIGTERM for {:?}, killing it",
                        stage.program, grace
                    );
                    if let Err(e) = stage.child.kill().await {
                        warn!("Failed to kill {}: {}", stage.program, e);
                    }
                }
            }
        }

        info!("Capture pipeline terminated");
    }
}

#[cfg(unix)]
fn request_termination(stage: &mut Stage) {
    // None once the exit status has been collected
    let Some(pid) = stage.child.id() else {
        return;
    };

    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc != 0 {
        debug!(
            "SIGTERM to {} (pid {}) failed: {}",
            stage.program,
            pid,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn request_termination(stage: &mut Stage) {
    if let Err(e) = stage.child.start_kill() {
        debug!("Failed to signal {}: {}", stage.program, e);
    }
}
