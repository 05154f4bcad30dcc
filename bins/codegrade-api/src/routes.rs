use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use codegrade_common::settings::Settings;
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

// Room for a maximal source plus JSON escaping and the case list.
const BODY_OVERHEAD_BYTES: usize = 256 * 1024;

/// Largest request body `/execute` will buffer.
pub fn body_limit(settings: &Settings) -> usize {
    settings
        .max_source_bytes
        .saturating_mul(2)
        .saturating_add(BODY_OVERHEAD_BYTES)
}

pub fn app(state: Arc<AppState>) -> Router {
    let body_limit = body_limit(state.engine.settings());

    Router::new()
        .route("/execute", post(handlers::execute_job))
        .route("/status", get(handlers::health_check))
        .route("/languages", get(handlers::list_languages))
        .route("/metrics", get(handlers::metrics_text))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
