//! API route handlers.

use axum::http::StatusCode;
use axum::{Json, extract::State};
use starwatch_scheduler::CycleOutcome;
use std::sync::Arc;

use crate::server::AppState;

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "starwatch",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Poller status.
pub async fn poller_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let scheduler = &state.scheduler;
    Json(serde_json::json!({
        "running": scheduler.is_running(),
        "armed": scheduler.is_armed(),
        "interval_minutes": state.interval_minutes,
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "last_outcome": scheduler.last_outcome(),
    }))
}

/// Run one star check now and report what it did.
pub async fn trigger_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    tracing::info!("🔔 Manual star check requested");
    let outcome = state.scheduler.run_once().await;

    let status = match &outcome {
        CycleOutcome::Completed(_) => StatusCode::OK,
        CycleOutcome::Skipped => StatusCode::CONFLICT,
        CycleOutcome::QuotaExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        CycleOutcome::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(serde_json::json!({
            "ok": status == StatusCode::OK,
            "outcome": outcome,
        })),
    )
}
