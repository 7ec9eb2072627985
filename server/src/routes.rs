//! HTTP route handlers for the wiki server.
//!
//! This module provides the HTTP API endpoints:
//!
//! - `GET /api/history?path=...` - History of one page, newest first
//! - `POST /api/history/scan` - Request a reconciliation pass
//! - `GET /health` - Health check endpoint
//!
//! # Architecture
//!
//! All routes share application state through [`AppState`], which contains:
//! - Configuration
//! - The history store, queried on the blocking pool
//! - The scan trigger of the background recorder
//! - Server start time for uptime reporting
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio::sync::watch;
//! use wiki_history::store::HistoryStore;
//! use wiki_history::trigger::HistoryRecorder;
//! use wiki_server::config::Config;
//! use wiki_server::routes::{create_router, AppState};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("failed to load config");
//!     let store = Arc::new(HistoryStore::open(&config.history.db_path).unwrap());
//!     let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!     let (trigger, _recorder) = HistoryRecorder::spawn(
//!         Arc::clone(&store),
//!         config.history.data_dir.clone(),
//!         config.history.recorder_settings(),
//!         shutdown_rx,
//!     );
//!
//!     let app = create_router(AppState::new(config, store, trigger));
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};
use wiki_history::store::HistoryStore;
use wiki_history::trigger::ScanTrigger;
use wiki_history::types::PageHistory;

use crate::config::Config;
use crate::error::{Result, ServerError};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for all route handlers.
///
/// Cloned for each request handler; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<Config>,

    /// History log of the tracked wiki.
    pub store: Arc<HistoryStore>,

    /// Requests passes from the background recorder.
    pub trigger: ScanTrigger,

    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Creates a new application state.
    #[must_use]
    pub fn new(config: Config, store: Arc<HistoryStore>, trigger: ScanTrigger) -> Self {
        Self {
            config: Arc::new(config),
            store,
            trigger,
            start_time: Instant::now(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("start_time", &self.start_time)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Router
// ============================================================================

/// Creates the application router with all routes configured.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST]);

    Router::new()
        .route("/api/history", get(get_history))
        .route("/api/history/scan", post(post_scan))
        .route("/health", get(get_health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// GET /api/history - Page History
// ============================================================================

/// Query parameters for the history endpoint.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Page path or route, e.g. `docs/setup.md` or `/docs/setup`.
    pub path: Option<String>,
}

/// GET /api/history - History of one page.
///
/// # Response
///
/// ```json
/// {
///   "history": [
///     {"id": 4, "path": "b/a.md", "hash": "...", "content": "...",
///      "status": "moved", "previousPath": "a.md", "recordedAt": "..."}
///   ],
///   "currentHash": "..."
/// }
/// ```
///
/// A page with no recorded history yields an empty `history` array.
async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<PageHistory>> {
    let path = match query.path {
        Some(path) if !path.trim().is_empty() => path,
        _ => {
            return Err(ServerError::validation(
                "missing_path",
                "query parameter 'path' is required",
            ))
        }
    };

    let store = Arc::clone(&state.store);
    let lookup_path = path.clone();
    let page = tokio::task::spawn_blocking(move || store.page_history(&lookup_path))
        .await
        .map_err(|e| ServerError::internal(format!("history lookup task failed: {e}")))??;

    debug!(path = %path, entries = page.history.len(), "Served page history");
    Ok(Json(page))
}

// ============================================================================
// POST /api/history/scan - On-demand Pass
// ============================================================================

/// Response body for a scan request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScanResponse {
    /// `false` when a request was already pending and this one was folded
    /// into it.
    pub queued: bool,
}

/// POST /api/history/scan - Ask the recorder for a pass.
///
/// Always answers `202 Accepted`; the pass runs in the background.
async fn post_scan(State(state): State<AppState>) -> (StatusCode, Json<ScanResponse>) {
    let queued = state.trigger.request();
    debug!(queued, "Scan requested over HTTP");
    (StatusCode::ACCEPTED, Json(ScanResponse { queued }))
}

// ============================================================================
// GET /health - Health Check
// ============================================================================

/// Response body for health check endpoint.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the history store cannot be read.
    pub status: String,

    /// Server uptime in seconds.
    pub uptime_seconds: u64,

    /// Number of recorded history entries.
    pub history_entries: Option<u64>,
}

/// GET /health - Health check endpoint.
///
/// # Response
///
/// ```json
/// {
///   "status": "ok",
///   "uptimeSeconds": 3600,
///   "historyEntries": 128
/// }
/// ```
async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = state.start_time.elapsed();
    let store = Arc::clone(&state.store);

    let history_entries = match tokio::task::spawn_blocking(move || store.entry_count()).await {
        Ok(Ok(count)) => Some(count),
        Ok(Err(e)) => {
            warn!(error = %e, "Health check could not read history store");
            None
        }
        Err(e) => {
            warn!(error = %e, "Health check task failed");
            None
        }
    };

    Json(HealthResponse {
        status: if history_entries.is_some() { "ok" } else { "degraded" }.to_string(),
        uptime_seconds: uptime.as_secs(),
        history_entries,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::response::Response;
    use std::path::Path;
    use std::time::Duration;
    use tokio::sync::watch;
    use tower::ServiceExt;
    use wiki_history::trigger::{HistoryRecorder, RecorderSettings};

    use crate::error::ErrorResponse;

    /// Test fixture holding the recorder alive for the duration of a test.
    struct Fixture {
        state: AppState,
        _shutdown: watch::Sender<bool>,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let history = wiki_history::config::Config {
            data_dir: dir.path().to_path_buf(),
            db_path: dir.path().join("history.db"),
            scan_interval: Duration::from_secs(3600),
            settle_delay: Duration::ZERO,
            watch_enabled: false,
        };
        let store = Arc::new(HistoryStore::open_in_memory().unwrap());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (trigger, _handle) = HistoryRecorder::spawn(
            Arc::clone(&store),
            history.data_dir.clone(),
            RecorderSettings {
                scan_interval: history.scan_interval,
                settle_delay: history.settle_delay,
            },
            shutdown_rx,
        );

        Fixture {
            state: AppState::new(Config { port: 0, history }, store, trigger),
            _shutdown: shutdown_tx,
            _dir: dir,
        }
    }

    fn root(fixture: &Fixture) -> &Path {
        &fixture.state.config.history.data_dir
    }

    async fn get(state: AppState, uri: &str) -> Response {
        create_router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    // ========================================================================
    // GET /health tests
    // ========================================================================

    #[tokio::test]
    async fn health_returns_ok_status() {
        let fixture = fixture();

        let response = get(fixture.state.clone(), "/health").await;
        assert_eq!(response.status(), StatusCode::OK);

        let health: HealthResponse = body_json(response).await;
        assert_eq!(health.status, "ok");
        assert!(health.history_entries.is_some());
    }

    #[tokio::test]
    async fn health_uses_camel_case_fields() {
        let fixture = fixture();

        let response = get(fixture.state.clone(), "/health").await;
        let json: serde_json::Value = body_json(response).await;

        assert!(json.get("uptimeSeconds").is_some());
        assert!(json.get("historyEntries").is_some());
    }

    // ========================================================================
    // GET /api/history tests
    // ========================================================================

    #[tokio::test]
    async fn history_requires_path() {
        let fixture = fixture();

        for uri in ["/api/history", "/api/history?path=", "/api/history?path=%20"] {
            let response = get(fixture.state.clone(), uri).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri {uri}");

            let error: ErrorResponse = body_json(response).await;
            assert_eq!(error.code.as_deref(), Some("missing_path"));
        }
    }

    #[tokio::test]
    async fn history_rejects_parent_segments() {
        let fixture = fixture();

        let response = get(fixture.state.clone(), "/api/history?path=../secret.md").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let error: ErrorResponse = body_json(response).await;
        assert_eq!(error.code.as_deref(), Some("invalid_path"));
    }

    #[tokio::test]
    async fn history_of_unknown_page_is_empty() {
        let fixture = fixture();

        let response = get(fixture.state.clone(), "/api/history?path=nothing/here").await;
        assert_eq!(response.status(), StatusCode::OK);

        let page: PageHistory = body_json(response).await;
        assert!(page.history.is_empty());
        assert!(page.current_hash.is_none());
    }

    #[tokio::test]
    async fn history_returns_entries_and_current_hash() {
        let fixture = fixture();
        std::fs::write(root(&fixture).join("intro.md"), "# intro").unwrap();
        fixture.state.store.capture_file_history(root(&fixture)).unwrap();

        let response = get(fixture.state.clone(), "/api/history?path=/intro").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = body_json(response).await;
        let history = json["history"].as_array().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["path"], "intro.md");
        assert_eq!(history[0]["status"], "created");
        assert_eq!(json["currentHash"], history[0]["hash"]);
    }

    // ========================================================================
    // POST /api/history/scan tests
    // ========================================================================

    #[tokio::test]
    async fn scan_request_is_accepted() {
        let fixture = fixture();

        let response = create_router(fixture.state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/history/scan")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let scan: ScanResponse = body_json(response).await;
        assert!(scan.queued);
    }

    #[tokio::test]
    async fn scan_route_rejects_get() {
        let fixture = fixture();
        let response = get(fixture.state.clone(), "/api/history/scan").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let fixture = fixture();
        let response = get(fixture.state.clone(), "/nonexistent").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
