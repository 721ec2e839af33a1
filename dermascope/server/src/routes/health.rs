//! Health check endpoint
//!
//! Reports liveness plus what this instance is actually serving: the model
//! it loaded, the lesion classes it can predict and the backend it runs on.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::SharedState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub started_at: String,
    /// Path the served model weights were loaded from
    pub model: String,
    /// Lesion classes the loaded classifier predicts
    pub classes: usize,
    pub backend: String,
    pub version: String,
}

/// GET /health - Health check endpoint
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_seconds: state.uptime_seconds(),
        started_at: state.started_at.to_rfc3339(),
        model: state.model_path.display().to_string(),
        classes: state.service.lock().unwrap().explainer().taxonomy().len(),
        backend: dermascope::backend::backend_name().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
