//! Liveness probe (§6's `GET /health`).

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
}

/// Liveness probe. Reports database reachability but never fails the probe itself on a down
/// database — a down dependency is surfaced in the body, not via a non-200 status, so an
/// orchestrator doesn't restart a process that's otherwise fine.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.db.ping().await {
        Ok(()) => "up",
        Err(_) => "down",
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        database: database.to_string(),
    })
}
