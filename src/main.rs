//! Classroom Grader · Backend
//!
//! - Axum HTTP JSON API for classes, assignments and submissions
//! - AI grading through an OpenAI-compatible service, with offline fallback
//! - Static frontend fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                   : u16 (default 3000)
//!   OPENAI_API_KEY         : enables AI grading if present
//!   OPENAI_BASE_URL        : default "https://api.openai.com/v1"
//!   OPENAI_MODEL           : default "gpt-4o-mini"
//!   GRADER_CONFIG_PATH     : path to TOML config (prompts + grading settings)
//!   GRADING_MODE           : "ai" | "ai_with_fallback" | "offline"
//!   GRADING_TIMEOUT_SECS   : per-call deadline (default 15)
//!   GRADING_MAX_CONCURRENT : outstanding AI calls (default 8)
//!   LOG_LEVEL              : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT             : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use classroom_grader::routes::build_router;
use classroom_grader::state::AppState;
use classroom_grader::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared application state (in-memory stores, grader with optional OpenAI client).
  let state = Arc::new(AppState::new());

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "classroom_grader", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "classroom_grader", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "classroom_grader", "Shutdown signal received");
}
