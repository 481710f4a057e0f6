use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::app::AppState;

/// GET /health — liveness probe, returns server metadata and provider registration.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let jobs = state.scheduler.list_jobs().map(|j| j.len()).unwrap_or(0);

    Json(json!({
        "status": "ok",
        "login": state.login_id.as_str(),
        "scheduled_jobs": jobs,
    }))
}
