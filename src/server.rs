//! HTTP server receiving login telemetry beacons.
//!
//! This module provides an HTTP server that:
//! - Accepts raw beacons from the login page via POST /collect-raw-login-data
//! - Extracts the behavioral feature vector
//! - Appends the bound record to the CSV file and the SQLite store
//!
//! # Architecture
//!
//! ```text
//! Login page ──→ POST /collect-raw-login-data ──→ [Extract + Bind] ──┬──→ CSV file
//!                                                                     └──→ SQLite store
//! ```
//!
//! A malformed body is answered with 400 and a storage failure with 500, so
//! client errors and infrastructure errors stay distinguishable.

use crate::beacon::Beacon;
use crate::core::{build_record, CaptureContext};
use crate::sink::{CsvSink, SinkWriter, SqliteStore, UnavailableSink};
use crate::transparency::{
    create_shared_log, create_shared_log_with_persistence, IngestStats, SharedIngestLog,
};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::{get, post, MethodRouter},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// CSV sink file
    pub csv_path: PathBuf,
    /// SQLite store file
    pub store_path: PathBuf,
    /// Extra attempts per failed sink write
    pub sink_retries: u32,
    /// Where ingest statistics are persisted, if anywhere
    pub stats_path: Option<PathBuf>,
}

impl ServerConfig {
    pub fn new(port: u16, csv_path: PathBuf, store_path: PathBuf) -> Self {
        Self {
            port,
            csv_path,
            store_path,
            sink_retries: 1,
            stats_path: None,
        }
    }

    pub fn from_config(config: &crate::Config) -> Self {
        Self {
            port: config.port,
            csv_path: config.csv_path.clone(),
            store_path: config.store_path.clone(),
            sink_retries: config.sink_retries,
            stats_path: Some(config.stats_path()),
        }
    }
}

/// Shared server state
pub struct ServerState {
    sinks: SinkWriter,
    stats: SharedIngestLog,
}

impl ServerState {
    /// Open both sinks. A store that cannot be opened is replaced by one that
    /// reports the error on every write, and the CSV sink keeps running.
    pub fn new(config: &ServerConfig) -> Self {
        let sinks = SinkWriter::new(config.sink_retries)
            .with_sink(CsvSink::new(config.csv_path.clone()));
        let sinks = match SqliteStore::open(&config.store_path) {
            Ok(store) => sinks.with_sink(store),
            Err(e) => {
                tracing::error!(
                    store = %config.store_path.display(),
                    "Store unavailable, continuing with CSV only: {}",
                    e
                );
                sinks.with_sink(UnavailableSink::new("store", e))
            }
        };

        let stats = match &config.stats_path {
            Some(path) => create_shared_log_with_persistence(path.clone()),
            None => create_shared_log(),
        };

        Self { sinks, stats }
    }
}

/// Response for a processed beacon
#[derive(Debug, Clone, Serialize)]
pub struct CollectResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub status: String,
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, label: &str, code: &str, error: String) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            status: label.to_string(),
            error,
            code: code.to_string(),
        }),
    )
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /stats
async fn stats(State(state): State<Arc<ServerState>>) -> Json<IngestStats> {
    Json(state.stats.stats())
}

/// POST /collect-raw-login-data
///
/// Decodes the beacon, extracts features and persists the record to both
/// sinks.
async fn collect(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CollectResponse>, ApiError> {
    state.stats.record_received();

    let beacon = Beacon::from_slice(&body).map_err(|e| {
        state.stats.record_rejected();
        tracing::warn!("Rejected beacon: {}", e);
        api_error(StatusCode::BAD_REQUEST, "bad_payload", "BAD_PAYLOAD", e.to_string())
    })?;

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let record = Arc::new(build_record(&beacon, &CaptureContext::now(user_agent)));
    state
        .stats
        .record_events(beacon.channels.event_count() as u64);

    let report = state.sinks.write(Arc::clone(&record)).await;
    if !report.is_success() {
        state.stats.record_sink_failure();
        let summary = report.failure_summary();
        tracing::error!(session_id = ?record.session_id, "Failed to persist record: {}", summary);
        return Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "sink_error",
            "SINK_ERROR",
            summary,
        ));
    }

    state.stats.record_saved();
    tracing::info!(session_id = ?record.session_id, mobile = record.is_mobile_device, "Record saved");

    Ok(Json(CollectResponse {
        status: "saved".to_string(),
        session_id: record.session_id.clone(),
    }))
}

/// Any other method on the collect route.
async fn ignored() -> (StatusCode, Json<CollectResponse>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(CollectResponse {
            status: "ignored".to_string(),
            session_id: None,
        }),
    )
}

fn collect_route() -> MethodRouter<Arc<ServerState>> {
    post(collect).fallback(ignored)
}

/// Build the application router.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/collect-raw-login-data", collect_route())
        .route("/collect-raw-login-data/", collect_route())
        .layer(
            // Beacons are posted cross-origin from the login page.
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Handle to a running server.
pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Stop accepting connections, drain in-flight requests and persist
    /// ingest statistics.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            tracing::error!("Server task failed: {}", e);
        }
    }
}

/// Run the HTTP server
pub async fn run(config: ServerConfig) -> anyhow::Result<ServerHandle> {
    let state = Arc::new(ServerState::new(&config));
    let app = router(Arc::clone(&state));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!(
        csv = %config.csv_path.display(),
        store = %config.store_path.display(),
        sinks = ?state.sinks.sink_names(),
        "Login sensor listening on http://{}",
        actual_addr
    );

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }

        tracing::info!("{}", state.stats.summary());
        if let Err(e) = state.stats.save() {
            tracing::warn!("Failed to save ingest stats: {}", e);
        }
    });

    Ok(ServerHandle {
        addr: actual_addr,
        shutdown_tx,
        task,
    })
}
