//! HTTP request handlers: metrics exposition and health.

use axum::Router;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;

use flexlm_core::metrics::TEXT_CONTENT_TYPE;

use crate::state::AppState;

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(handle_metrics))
        .route("/health", get(handle_health))
        .with_state(state)
}

// ============================================================
// Metrics
// ============================================================

/// Serves the text rendered at the end of the last poll cycle.
pub(crate) async fn handle_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.metrics.exposition();
    (
        [(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)],
        body.as_str().to_owned(),
    )
}

// ============================================================
// Health
// ============================================================

pub(crate) async fn handle_health() -> &'static str {
    "ok"
}
