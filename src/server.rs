//! Web server exposing the text metrics endpoint and health probe.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, header},
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::exposition;
use crate::metric::MetricHandle;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Frozen list of collector handles, in registration order.
    pub collectors: Arc<[MetricHandle]>,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    collectors: usize,
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Text exposition of every published sample. Always 200; collectors that
/// have not published yet simply contribute no lines.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = exposition::render(&state.collectors);
    (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        )],
        body,
    )
}

/// Liveness probe.
async fn healthz_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        collectors: state.collectors.len(),
    })
}
