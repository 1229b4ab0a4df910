//! # Cow Records
//!
//! ```text
//! GET   /api/cows/{id}   → Cow
//! PATCH /api/cows/{id}   → Cow   (partial body, same rules as sync updateCow)
//! ```

use axum::extract::{Path, State};
use axum::Json;
use tracing::info;

use herd_core::{Cow, CowPatch, RecordId};
use herd_db::{CowRepository, DbError};
use herd_sync::mutation;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn get_cow(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> Result<Json<Cow>, ApiError> {
    let mut conn = state.db.acquire().await?;
    let cow = CowRepository::new(&mut conn).require(id).await?;
    Ok(Json(cow))
}

/// Applies a partial update through the same mutation sync uses.
pub async fn patch_cow(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(patch): Json<CowPatch>,
) -> Result<Json<Cow>, ApiError> {
    let mut tx = state.db.begin().await?;
    let cow = mutation::update_cow(&mut tx, id, &patch).await?;
    tx.commit()
        .await
        .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

    info!(id, tag = %cow.tag, "Cow updated");
    Ok(Json(cow))
}
