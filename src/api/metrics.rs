//! Prometheus metrics endpoint
//!
//! Exposes application metrics in Prometheus format, plus a `/health` probe
//! reporting the streaming connection state.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;

use crate::AppState;
use crate::event::ConnectionState;
use crate::metrics::REGISTRY;

/// Metrics endpoint handler
///
/// Returns all metrics in Prometheus text format.
async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    match encoder.encode_to_string(&metric_families) {
        Ok(metrics_text) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, encoder.format_type())],
            metrics_text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    connection: String,
    accounts: usize,
    conversations: usize,
}

/// Always 200; `status` is "degraded" unless the stream is connected
async fn health_handler(State(state): State<AppState>) -> Json<Health> {
    let connection = state.streaming.state();
    Json(Health {
        status: if connection == ConnectionState::Connected {
            "ok"
        } else {
            "degraded"
        },
        connection: connection.to_string(),
        accounts: state.accounts.len().await,
        conversations: state.conversations.conversations().await.len(),
    })
}

/// Create metrics router
///
/// Exposes `/metrics` and `/health`.
pub fn metrics_router(state: AppState) -> Router {
    use tower_http::trace::TraceLayer;

    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
