//!
//! velo HTTP server
//! ----------------
//! Axum router exposing the file explorer core over HTTP.
//!
//! Routes:
//! - `GET /api/files?path=` directory listing as JSON.
//! - `GET /api/zip?path=` recursive zip download, streamed.
//! - `GET /files/{*path}` read-only file contents for previews and downloads.
//! - `GET /` health text.
//!
//! Requests share nothing mutable: the root and options are fixed at startup
//! and every listing or archive is built from the live filesystem.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::middleware;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};
use crate::explorer::{self, ArchiveOptions, Listing, ResolvedPath, Root, TraversalPolicy};

pub mod correlation;
pub mod static_files;
pub mod zip_body;

/// Shared server state injected into all handlers. Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<StateInner>,
}

struct StateInner {
    root: Root,
    traversal: TraversalPolicy,
    archive: ArchiveOptions,
}

impl AppState {
    pub fn new(root: Root, traversal: TraversalPolicy, archive: ArchiveOptions) -> Self {
        Self { inner: Arc::new(StateInner { root, traversal, archive }) }
    }

    pub fn root(&self) -> &Root { &self.inner.root }

    /// Resolve a client path, logging confinement violations as security events.
    pub fn resolve(&self, request: Option<&str>) -> AppResult<ResolvedPath> {
        explorer::resolve(&self.inner.root, request, self.inner.traversal).map_err(|denied| {
            warn!(target: "security", request = ?denied.request, reason = %denied.reason, "path denied");
            AppError::from(denied)
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PathQuery {
    pub path: Option<String>,
}

async fn list_handler(State(state): State<AppState>, Query(q): Query<PathQuery>) -> AppResult<Json<Listing>> {
    let resolved = state.resolve(q.path.as_deref())?;
    let rel = resolved.relative().to_string();
    let outcome = tokio::task::spawn_blocking(move || explorer::list(&resolved)).await;
    match outcome {
        Ok(Ok(listing)) => Ok(Json(listing)),
        Ok(Err(e)) => {
            if let explorer::ListError::Io(io) = &e {
                error!(path = %rel, error = %io, "listing failed");
            }
            Err(AppError::from(e))
        }
        Err(join) => {
            error!(target: "panic", path = %rel, "listing task failed: {}", join);
            Err(AppError::from(join))
        }
    }
}

async fn zip_handler(State(state): State<AppState>, Query(q): Query<PathQuery>) -> AppResult<Response> {
    let resolved = state.resolve(q.path.as_deref())?;
    let filename = explorer::archive_name(&resolved, state.root());
    info!(path = resolved.relative(), filename = %filename, "zip download");
    zip_body::archive_response(resolved, filename, state.inner.archive).await
}

/// Build the router over `state`. Exposed so tests can serve it on an ephemeral port.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "velo ok" }))
        .route("/api/files", get(list_handler))
        .route("/api/zip", get(zip_handler))
        .route("/files/{*path}", get(static_files::serve_file))
        .layer(middleware::from_fn(correlation::correlate))
        .with_state(state)
}

fn log_startup(cfg: &ServerConfig, root: &Root) {
    let cwd = std::env::current_dir().ok();
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "startup",
        "velo starting: RUST_LOG='{}', cwd={:?}, root={:?}, traversal={}, archive_hidden={}",
        rust_log, cwd, root.as_path(), cfg.traversal, cfg.archive_hidden
    );
}

/// Prepare the root directory and build the shared state from `cfg`.
pub fn prepare_state(cfg: &ServerConfig) -> anyhow::Result<AppState> {
    std::fs::create_dir_all(&cfg.root)
        .with_context(|| format!("Failed to create or access root directory: {}", cfg.root.display()))?;
    let root = Root::new(&cfg.root)
        .with_context(|| format!("While normalizing root directory: {}", cfg.root.display()))?;
    log_startup(cfg, &root);
    Ok(AppState::new(root, cfg.traversal, cfg.archive_options()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to install ctrl-c handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

/// Start the HTTP server described by `cfg` and serve until ctrl-c.
pub async fn run_with_config(cfg: ServerConfig) -> anyhow::Result<()> {
    let state = prepare_state(&cfg)?;
    let app = router(state);

    let addr = SocketAddr::new(cfg.bind, cfg.http_port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("velo running at http://{}", listener.local_addr().unwrap_or(addr));
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    Ok(())
}
