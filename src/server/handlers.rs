use crate::health::HealthAggregator;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::debug;

/// 200 when healthy, 503 otherwise; same body either way.
pub async fn health_handler(State(aggregator): State<HealthAggregator>) -> impl IntoResponse {
    let snapshot = aggregator.snapshot();
    let status = if snapshot.healthy {
        StatusCode::OK
    } else {
        debug!(
            "Reporting unhealthy (running: {}, uptime: {}s)",
            snapshot.running, snapshot.uptime
        );
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(snapshot))
}

pub async fn health_details_handler(
    State(aggregator): State<HealthAggregator>,
) -> impl IntoResponse {
    (StatusCode::OK, Json(aggregator.details()))
}
