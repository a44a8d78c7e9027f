//! Lesson tracker · learning-progress server
//!
//! - Server-rendered tracker UI over HTTP, live fragment updates over WebSocket
//! - File-backed progress store (completions, quizzes, bookmarks, streak)
//! - Lesson router serving the lesson folders next to the app
//! - Static app fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                : u16 (default 5173)
//!   LESSONS_ROOT        : folder holding the lesson directories (default "..")
//!   TRACKER_DATA_PATH   : progress store file (default "./tracker-store.json")
//!   STATIC_DIR          : static app assets (default "./static")
//!   TRACKER_CONFIG_PATH : optional TOML config (see config.rs)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod catalog;
mod store;
mod streak;
mod quiz;
mod playground;
mod logic;
mod transfer;
mod state;
mod protocol;
mod render;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::config::TrackerConfig;
use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let cfg = TrackerConfig::from_env();

  // Catalog + progress store; a broken catalog is the only fatal error.
  let state = Arc::new(AppState::from_config(&cfg)?);

  let app = build_router(state.clone());

  let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
  let listener = TcpListener::bind(addr).await?;
  info!(target: "tracker", %addr, lessons = state.catalog.total_lessons(), "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  info!(target: "tracker", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "tracker", error = %e, "Failed to listen for Ctrl+C");
    std::future::pending::<()>().await;
  }
}
