//! # Herdbook API Server
//!
//! ```text
//! RUST_LOG=debug HERDBOOK_DB_PATH=/var/lib/herdbook/herd.db herdbook
//! ```

use tracing::info;

use herdbook_api::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    herdbook_api::init_tracing();

    info!("Starting Herdbook API server...");

    let config = ApiConfig::load()?;
    info!(
        port = config.port,
        db_path = %config.db_path.display(),
        sync_max_jobs = config.sync_max_jobs,
        "Configuration loaded"
    );

    herdbook_api::serve(config).await
}
