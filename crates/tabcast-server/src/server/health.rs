//! Health and status endpoints.

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::server::AppState;

/// `GET /` — service identity plus a quick connectivity flag.
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    let status = state.relay.status().await;
    Json(json!({
        "name": "tabcast",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "extension_connected": status.connected,
    }))
}

/// `GET /health` — detailed health check for monitoring collaborators.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let status = state.relay.status().await;
    Json(json!({
        "status": "healthy",
        "extension": {
            "connected": status.connected,
            "pending_requests": status.pending_calls,
        }
    }))
}
