use crate::config::ServerConfig;
use crate::error::{CamkeeperError, Result};
use crate::health::HealthAggregator;
use crate::shutdown::ShutdownSignal;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers::{health_details_handler, health_handler};

pub fn router(aggregator: HealthAggregator) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/health/details", get(health_details_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(aggregator)
}

/// Serves the health endpoints until shutdown.
pub struct HealthServer {
    pub(crate) config: ServerConfig,
    aggregator: HealthAggregator,
}

impl HealthServer {
    pub fn new(config: ServerConfig, aggregator: HealthAggregator) -> Self {
        Self { config, aggregator }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.config.ip, self.config.port)
    }

    pub async fn start(&self, shutdown: ShutdownSignal) -> Result<()> {
        let addr = self.address();
        info!("Starting health server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| CamkeeperError::Bind {
                address: addr.clone(),
                source: e,
            })?;

        info!("Health server listening on {}", addr);

        axum::serve(listener, router(self.aggregator.clone()))
            .with_graceful_shutdown(async move { shutdown.triggered().await })
            .await?;

        info!("Health server stopped");
        Ok(())
    }
}
