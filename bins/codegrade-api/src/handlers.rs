// HTTP route handlers for the codegrade API

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use codegrade_common::request;
use codegrade_common::response;
use codegrade_common::types::ExecutionResult;
use codegrade_engine::Phase;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::metrics;
use crate::routes;
use crate::AppState;

/// POST /execute - Run a job and return its result
///
/// Always answers 200 with an encoded result; failures, including bodies that
/// could not be read, are reported through its `status` and `errors`. If the
/// client goes away, the job future is dropped, which kills the running
/// program.
pub async fn execute_job(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> impl IntoResponse {
    let start = Instant::now();

    let decoded = body
        .map_err(|rejection| body_error(&state, rejection))
        .and_then(|body| decode_body(&body));

    let (result, phase) = match decoded {
        Err(e) => {
            warn!(error = %e, "Rejected malformed request");
            (ExecutionResult::failure(e.to_string()), Phase::Rejected)
        }
        Ok(job_request) => match state.permits.acquire().await {
            Ok(_permit) => {
                let _in_flight = metrics::InFlight::start();
                state.engine.execute_traced(job_request).await
            }
            Err(e) => {
                error!(error = %e, "Job slots unavailable");
                (
                    ExecutionResult::failure("internal error: server is shutting down"),
                    Phase::Rejected,
                )
            }
        },
    };

    let elapsed = start.elapsed();
    metrics::record_job(phase, elapsed);
    info!(
        status = ?result.status,
        phase = %phase,
        outputs = result.outputs.len(),
        errors = result.errors.len(),
        execution_ms = elapsed.as_millis() as u64,
        "Job finished"
    );

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        response::encode(&result),
    )
}

fn body_error(state: &AppState, rejection: BytesRejection) -> request::RequestError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        request::RequestError::Malformed(format!(
            "body exceeds {} bytes",
            routes::body_limit(state.engine.settings())
        ))
    } else {
        request::RequestError::Malformed(rejection.body_text())
    }
}

fn decode_body(body: &[u8]) -> Result<codegrade_common::types::JobRequest, request::RequestError> {
    let text = std::str::from_utf8(body).map_err(|_| {
        request::RequestError::Malformed("body is not valid UTF-8".to_string())
    })?;
    request::decode(text)
}

/// GET /status - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[derive(Debug, Serialize)]
pub struct LanguagesResponse {
    pub languages: Vec<String>,
}

/// GET /languages - Configured language names
pub async fn list_languages(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(LanguagesResponse {
        languages: state.engine.registry().languages(),
    })
}

/// GET /metrics - Prometheus text format
pub async fn metrics_text() -> impl IntoResponse {
    match metrics::render() {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable").into_response()
        }
    }
}
