//! # Application State
//!
//! Shared by every handler through axum's `State` extractor. Every field is
//! cheap to clone: the engines hold a pooled `Database` handle and the
//! configuration sits behind an `Arc`.

use std::sync::Arc;

use herd_db::Database;
use herd_import::ImportEngine;
use herd_sync::SyncEngine;

use crate::config::ApiConfig;

#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub sync: SyncEngine,
    pub import: ImportEngine,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    pub fn new(db: Database, config: ApiConfig) -> Self {
        AppState {
            sync: SyncEngine::new(db.clone()).with_max_jobs(config.sync_max_jobs),
            import: ImportEngine::new(db.clone()).with_max_bytes(config.max_upload_bytes),
            db,
            config: Arc::new(config),
        }
    }
}
