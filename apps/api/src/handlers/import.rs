//! # Import Endpoint
//!
//! `POST /api/import/` takes one multipart field, `file`, holding a herd
//! register workbook.
//!
//! ## Bodies
//! ```text
//! committed { "status": "ok", "created": 12, "updated": 3,
//!             "errors": ["Sheet 'NORTH', row 14: tag is required"],
//!             "linked": 9, "unresolvedTags": ["T-77"] }
//! aborted   { "error": "could not read workbook: ..." }
//! ```

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, info};

use herd_import::ImportReport;

use crate::error::ApiError;
use crate::state::AppState;

const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub status: &'static str,
    pub created: usize,
    pub updated: usize,
    pub errors: Vec<String>,
    pub linked: usize,
    pub unresolved_tags: Vec<String>,
}

impl From<ImportReport> for ImportResponse {
    fn from(report: ImportReport) -> Self {
        ImportResponse {
            status: "ok",
            created: report.created,
            updated: report.updated,
            errors: report.errors,
            linked: report.linked,
            unresolved_tags: report.unresolved_tags,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ImportFailure {
    pub error: String,
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ImportFailure {
            error: message.into(),
        }),
    )
        .into_response()
}

pub async fn import(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let upload = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(FILE_FIELD) => {
                let file_name = field.file_name().map(str::to_string);
                match field.bytes().await {
                    Ok(bytes) => break (file_name, bytes),
                    Err(e) => return failure(e.status(), e.body_text()),
                }
            }
            Ok(Some(_)) => continue,
            Ok(None) => return failure(StatusCode::BAD_REQUEST, "No file uploaded"),
            Err(e) => return failure(e.status(), e.body_text()),
        }
    };

    let (file_name, bytes) = upload;
    info!(file = ?file_name, size = bytes.len(), "Workbook received");

    match state.import.import_bytes(bytes.to_vec()).await {
        Ok(report) => Json(ImportResponse::from(report)).into_response(),
        Err(e) => {
            error!(error = %e, "Import aborted");
            let message = e.to_string();
            failure(ApiError::from(e).code.status(), message)
        }
    }
}
