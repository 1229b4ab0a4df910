//! # Sync Endpoint
//!
//! `POST /api/sync/` replays one client's offline queue.
//!
//! ## Bodies
//! ```text
//! request   { "jobs": [Job, ...] }
//! committed { "status": "ok",    "results": [JobOutcome, ...] }
//! aborted   { "status": "error", "message": "..." }
//! ```
//!
//! `ok` only means the batch committed. Individual jobs may still carry
//! `status: "error"` in their outcome.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

use herd_core::{Job, JobOutcome};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub jobs: Vec<Job>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SyncResponse {
    Ok { results: Vec<JobOutcome> },
    Error { message: String },
}

impl SyncResponse {
    fn error(status: StatusCode, message: impl Into<String>) -> Response {
        (
            status,
            Json(SyncResponse::Error {
                message: message.into(),
            }),
        )
            .into_response()
    }
}

pub async fn sync(
    State(state): State<AppState>,
    body: Result<Json<SyncRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return SyncResponse::error(rejection.status(), rejection.body_text()),
    };

    match state.sync.apply_batch(request.jobs).await {
        Ok(report) => Json(SyncResponse::Ok {
            results: report.results,
        })
        .into_response(),
        Err(e) => {
            error!(error = %e, "Sync batch aborted");
            let message = e.to_string();
            SyncResponse::error(ApiError::from(e).code.status(), message)
        }
    }
}
