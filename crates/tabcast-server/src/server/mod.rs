//! HTTP and WebSocket surface for the tabcast relay.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::relay::{ExtensionRelay, RelayError};

pub mod health;
pub mod tabs;
pub mod ws;

/// Shared application state, dependency-injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<ExtensionRelay>,
    /// Capacity of the outbound frame buffer per extension connection.
    pub channel_capacity: usize,
}

/// Build the application router with all routes and middleware attached.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route("/ws", get(ws::ws_handler))
        .route("/tab/new", post(tabs::create_tab))
        .route("/tabs", get(tabs::list_tabs))
        .route("/tab/active", get(tabs::active_tab))
        .route("/tab/{tab_id}/navigate", post(tabs::navigate_tab))
        .route("/tab/{tab_id}/activate", post(tabs::activate_tab))
        .route("/tab/{tab_id}/reload", post(tabs::reload_tab))
        .route("/tab/{tab_id}/content", get(tabs::tab_content))
        .route("/tab/{tab_id}/metadata", get(tabs::tab_metadata))
        .route("/tab/{tab_id}/interact", post(tabs::interact))
        .route("/tab/{tab_id}", delete(tabs::close_tab))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Build a uniform JSON error body.
pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "success": false, "error": message.into() })),
    )
        .into_response()
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::ConnectionLost | Self::ConnectionReplaced => StatusCode::BAD_GATEWAY,
            Self::Remote(_) | Self::DuplicateRequestId(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &self {
            Self::NotConnected => {
                "Extension not connected. Ensure the extension is installed and running."
                    .to_string()
            }
            other => other.to_string(),
        };
        error_response(status, message)
    }
}
