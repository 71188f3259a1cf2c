use super::{CamkeeperOrchestrator, ShutdownReason};
use crate::camera::Backend;
use crate::error::{CamkeeperError, Result};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tracing::{info, warn};

type ShutdownSender = Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>;

impl<B: Backend> CamkeeperOrchestrator<B> {
    /// Run until a termination signal or a shutdown request, then tear down.
    /// Returns the process exit code.
    pub async fn run(&mut self) -> Result<i32> {
        info!("camkeeper is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| CamkeeperError::system("Shutdown sender already taken"))?;

        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| CamkeeperError::system("Shutdown receiver already taken"))?;

        self.setup_signal_handlers(shutdown_sender);

        let shutdown_reason = shutdown_receiver
            .await
            .map_err(|_| CamkeeperError::system("Shutdown channel closed unexpectedly"))?;

        info!("Shutdown initiated: {}", shutdown_reason);

        let exit_code = self.shutdown(shutdown_reason).await;

        info!("camkeeper shutdown complete");
        Ok(exit_code)
    }

    /// First of SIGTERM, SIGINT or an internal request wins
    fn setup_signal_handlers(&self, shutdown_sender: oneshot::Sender<ShutdownReason>) {
        let shutdown_sender: ShutdownSender = Arc::new(Mutex::new(Some(shutdown_sender)));

        // Handle SIGTERM (systemd stop) - Unix only
        #[cfg(unix)]
        {
            let sender = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate())
                {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        warn!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    send_reason(&sender, ShutdownReason::Signal("SIGTERM".to_string())).await;
                }
            });
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        let sender = Arc::clone(&shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                send_reason(&sender, ShutdownReason::Signal("SIGINT".to_string())).await;
            }
        });

        let sender = Arc::clone(&shutdown_sender);
        let requested = self.shutdown.clone();
        tokio::spawn(async move {
            requested.triggered().await;
            send_reason(&sender, ShutdownReason::UserRequest).await;
        });
    }
}

async fn send_reason(sender: &ShutdownSender, reason: ShutdownReason) {
    if let Some(sender) = sender.lock().await.take() {
        let _ = sender.send(reason);
    }
}
