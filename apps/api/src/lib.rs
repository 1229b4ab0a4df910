//! # Herdbook API
//!
//! HTTP surface over the sync and import engines.
//!
//! ## Routes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Herdbook API                                  │
//! │                                                                         │
//! │  POST  /api/sync/        ───► SyncEngine::apply_batch                   │
//! │  POST  /api/import/      ───► ImportEngine::import_bytes                │
//! │  GET   /api/cows/{id}    ───► CowRepository::require                    │
//! │  PATCH /api/cows/{id}    ───► mutation::update_cow                      │
//! │  GET   /health           ───► Database::health_check                    │
//! │                                                                         │
//! │  TraceLayer on every request; state shared via AppState                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Authentication is expected in front of this server.

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use herd_db::{Database, DbConfig};

pub use config::{ApiConfig, ConfigError};
pub use error::{ApiError, ErrorCode};
pub use state::AppState;

use handlers::{cow, health, import, sync};

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Builds the router with all routes and layers.
pub fn router(state: AppState) -> Router {
    let body_limit = state
        .config
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/sync/",
            post(sync::sync).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/api/import/",
            post(import::import).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/cows/{id}", get(cow::get_cow).patch(cow::patch_cow))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Used when `RUST_LOG` is unset. Targets match by prefix, so `herd`
/// covers every `herd_*` crate and `herdbook_api`.
pub const DEFAULT_LOG_FILTER: &str = "info,herd=debug,sqlx=warn";

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=herd_sync=trace` - Show trace for one crate only
/// - Default: [`DEFAULT_LOG_FILTER`]
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Opens the database and serves until Ctrl+C or SIGTERM.
pub async fn serve(config: ApiConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr()?;

    let db = Database::new(
        DbConfig::new(config.db_path.clone()).max_connections(config.db_max_connections),
    )
    .await?;
    let state = AppState::new(db.clone(), config);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Herdbook API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const BOUNDARY: &str = "herdbook-test-boundary";

    async fn test_app(config: ApiConfig) -> Router {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        router(AppState::new(db, config))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn upload(field: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; \
                 filename=\"herd.xlsx\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/import/")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    /// Builds a real xlsx file: each sheet is a header row plus data rows.
    fn xlsx(sheets: &[(&str, &[&[&str]])]) -> Vec<u8> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        for (name, rows) in sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(*name).unwrap();
            for (r, cells) in rows.iter().enumerate() {
                for (c, value) in cells.iter().enumerate() {
                    worksheet
                        .write_string(r as u32, c as u16, *value)
                        .unwrap();
                }
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_default_log_filter_parses() {
        let filter = EnvFilter::try_new(DEFAULT_LOG_FILTER).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("herd=debug"));
        assert!(rendered.contains("sqlx=warn"));
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(ApiConfig::default()).await;
        let (status, body) = send(&app, get_request("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_sync_create_then_update_by_temp_id() {
        let app = test_app(ApiConfig::default()).await;
        let jobs = json!({"jobs": [
            {"id": 1, "action": "createCow", "tempId": -1,
             "payload": {"tag": "PL-1", "name": "Morag"}},
            {"id": 2, "action": "updateCow", "entityId": -1,
             "payload": {"notes": "calved easily"}},
        ]});

        let (status, body) = send(&app, json_request("POST", "/api/sync/", jobs)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["status"], "ok");
        assert_eq!(results[1]["status"], "ok");
        assert_eq!(results[0]["realId"], results[1]["realId"]);

        let id = results[0]["realId"].as_i64().unwrap();
        let (status, cow) = send(&app, get_request(&format!("/api/cows/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cow["tag"], "PL-1");
        assert_eq!(cow["notes"], "calved easily");
    }

    #[tokio::test]
    async fn test_sync_job_errors_keep_batch_ok() {
        let app = test_app(ApiConfig::default()).await;
        let jobs = json!({"jobs": [
            {"action": "createCow", "tempId": -1, "payload": {"tag": "PL-1", "name": "A"}},
            {"action": "createCow", "tempId": -2, "payload": {"tag": "PL-1", "name": "B"}},
            {"action": "milkCow", "payload": {}},
        ]});

        let (status, body) = send(&app, json_request("POST", "/api/sync/", jobs)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["results"][1]["status"], "error");
        assert_eq!(body["results"][1]["error"], "tag 'PL-1' already exists");
        assert_eq!(body["results"][2]["status"], "error");
    }

    #[tokio::test]
    async fn test_sync_rejects_oversized_batch() {
        let config = ApiConfig {
            sync_max_jobs: 1,
            ..ApiConfig::default()
        };
        let app = test_app(config).await;
        let jobs = json!({"jobs": [
            {"action": "deleteTask", "entityId": 1},
            {"action": "deleteTask", "entityId": 2},
        ]});

        let (status, body) = send(&app, json_request("POST", "/api/sync/", jobs)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "batch of 2 jobs exceeds the limit of 1");
    }

    #[tokio::test]
    async fn test_sync_malformed_body() {
        let app = test_app(ApiConfig::default()).await;
        let request = Request::builder()
            .method("POST")
            .uri("/api/sync/")
            .header("content-type", "application/json")
            .body(Body::from("{\"jobs\": ["))
            .unwrap();

        let (status, body) = send(&app, request).await;

        assert!(status.is_client_error());
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_patch_cow_rules() {
        let app = test_app(ApiConfig::default()).await;
        let jobs = json!({"jobs": [
            {"action": "createCow", "tempId": -1, "payload": {"tag": "PL-1", "name": "Morag"}},
        ]});
        let (_, body) = send(&app, json_request("POST", "/api/sync/", jobs)).await;
        let id = body["results"][0]["realId"].as_i64().unwrap();

        let (status, err) = send(
            &app,
            json_request("PATCH", &format!("/api/cows/{id}"), json!({"dam": id})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "VALIDATION_ERROR");
        assert_eq!(err["message"], "a cow cannot be its own dam");

        let (status, cow) = send(
            &app,
            json_request("PATCH", &format!("/api/cows/{id}"), json!({"name": "Flora"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cow["name"], "Flora");

        let (status, err) = send(
            &app,
            json_request("PATCH", "/api/cows/999", json!({"name": "Ghost"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_import_requires_file_field() {
        let app = test_app(ApiConfig::default()).await;
        let (status, body) = send(&app, upload("attachment", b"whatever")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file uploaded");
    }

    #[tokio::test]
    async fn test_import_xlsx_upload_links_across_sheets() {
        let app = test_app(ApiConfig::default()).await;
        let header: &[&str] = &["Tag", "Name", "Sex", "Dam tag"];
        let north: &[&[&str]] = &[header, &["T-200", "Flora", "F", "T-100"]];
        let south: &[&[&str]] = &[header, &["T-100", "Morag", "F", ""]];
        let bytes = xlsx(&[("NORTH Register", north), ("SOUTH Register", south)]);

        let (status, body) = send(&app, upload("file", &bytes)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["created"], 2);
        assert_eq!(body["updated"], 0);
        assert_eq!(body["errors"], json!([]));
        assert_eq!(body["linked"], 1);

        let mut by_tag = std::collections::HashMap::new();
        for id in [1, 2] {
            let (status, cow) = send(&app, get_request(&format!("/api/cows/{id}"))).await;
            assert_eq!(status, StatusCode::OK);
            by_tag.insert(cow["tag"].as_str().unwrap().to_string(), cow);
        }
        assert_eq!(by_tag["T-200"]["dam"], by_tag["T-100"]["id"]);
    }

    #[tokio::test]
    async fn test_import_rejects_non_workbook() {
        let app = test_app(ApiConfig::default()).await;
        let (status, body) = send(&app, upload("file", b"tag,name\nPL-1,Morag\n")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("could not read workbook"));
    }
}
