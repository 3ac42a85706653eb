//! Tab management routes.
//!
//! Every handler here is a thin wrapper: build a command frame, relay it to
//! the extension, map the outcome. All correlation and timeout behavior
//! lives in [`crate::relay`].

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use tabcast_proto::{CommandFrame, ResponseFrame, actions};

use crate::markdown::{self, Strategy};
use crate::relay::RelayError;
use crate::server::{AppState, error_response};

const fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct TabCreate {
    pub url: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// `POST /tab/new` — open a new tab.
pub async fn create_tab(
    State(state): State<AppState>,
    Json(req): Json<TabCreate>,
) -> Result<Json<ResponseFrame>, RelayError> {
    let command = CommandFrame::new(actions::ACTION_CREATE_TAB)
        .param("url", json!(req.url))
        .param("active", json!(req.active));
    Ok(Json(state.relay.call(command, None).await?))
}

#[derive(Debug, Deserialize)]
pub struct TabsQuery {
    pub active: Option<bool>,
    pub current_window: Option<bool>,
}

/// `GET /tabs` — list open tabs, optionally filtered.
pub async fn list_tabs(
    State(state): State<AppState>,
    Query(query): Query<TabsQuery>,
) -> Result<Json<ResponseFrame>, RelayError> {
    let mut filter = Map::new();
    if let Some(active) = query.active {
        filter.insert("active".to_string(), json!(active));
    }
    if let Some(current_window) = query.current_window {
        filter.insert("currentWindow".to_string(), json!(current_window));
    }
    let command =
        CommandFrame::new(actions::ACTION_GET_TABS).param("filter", Value::Object(filter));
    Ok(Json(state.relay.call(command, None).await?))
}

/// `GET /tab/active` — the active tab of the current window.
pub async fn active_tab(State(state): State<AppState>) -> Result<Json<ResponseFrame>, RelayError> {
    let command = CommandFrame::new(actions::ACTION_GET_ACTIVE_TAB);
    Ok(Json(state.relay.call(command, None).await?))
}

#[derive(Debug, Deserialize)]
pub struct NavigateQuery {
    pub url: String,
}

/// `POST /tab/{tab_id}/navigate` — navigate a tab to a new URL.
pub async fn navigate_tab(
    State(state): State<AppState>,
    Path(tab_id): Path<i64>,
    Query(query): Query<NavigateQuery>,
) -> Result<Json<ResponseFrame>, RelayError> {
    let command = CommandFrame::new(actions::ACTION_NAVIGATE_TAB)
        .param("tabId", json!(tab_id))
        .param("url", json!(query.url));
    Ok(Json(state.relay.call(command, None).await?))
}

/// `POST /tab/{tab_id}/activate` — focus a tab.
pub async fn activate_tab(
    State(state): State<AppState>,
    Path(tab_id): Path<i64>,
) -> Result<Json<ResponseFrame>, RelayError> {
    let command =
        CommandFrame::new(actions::ACTION_ACTIVATE_TAB).param("tabId", json!(tab_id));
    Ok(Json(state.relay.call(command, None).await?))
}

#[derive(Debug, Deserialize)]
pub struct ReloadQuery {
    #[serde(default)]
    pub bypass_cache: bool,
}

/// `POST /tab/{tab_id}/reload` — reload a tab.
pub async fn reload_tab(
    State(state): State<AppState>,
    Path(tab_id): Path<i64>,
    Query(query): Query<ReloadQuery>,
) -> Result<Json<ResponseFrame>, RelayError> {
    let command = CommandFrame::new(actions::ACTION_RELOAD_TAB)
        .param("tabId", json!(tab_id))
        .param("bypassCache", json!(query.bypass_cache));
    Ok(Json(state.relay.call(command, None).await?))
}

/// `GET /tab/{tab_id}/metadata` — page metadata (title, description, OG tags).
pub async fn tab_metadata(
    State(state): State<AppState>,
    Path(tab_id): Path<i64>,
) -> Result<Json<ResponseFrame>, RelayError> {
    let command =
        CommandFrame::new(actions::ACTION_GET_METADATA).param("tabId", json!(tab_id));
    Ok(Json(state.relay.call(command, None).await?))
}

/// `DELETE /tab/{tab_id}` — close a tab.
pub async fn close_tab(
    State(state): State<AppState>,
    Path(tab_id): Path<i64>,
) -> Result<Json<ResponseFrame>, RelayError> {
    let command = CommandFrame::new(actions::ACTION_CLOSE_TAB).param("tabId", json!(tab_id));
    Ok(Json(state.relay.call(command, None).await?))
}

const fn default_interaction_timeout() -> u64 {
    5000
}

#[derive(Debug, Deserialize)]
pub struct InteractionRequest {
    /// click, input, select, wait, waitForElement, getText, getAttribute
    pub action: String,
    pub selector: Option<String>,
    pub value: Option<String>,
    /// Timeout in milliseconds, enforced by the extension.
    #[serde(default = "default_interaction_timeout")]
    pub timeout: u64,
}

/// `POST /tab/{tab_id}/interact` — run a DOM interaction inside a tab.
pub async fn interact(
    State(state): State<AppState>,
    Path(tab_id): Path<i64>,
    Json(req): Json<InteractionRequest>,
) -> Result<Json<ResponseFrame>, RelayError> {
    let command = CommandFrame::new(actions::ACTION_INTERACT)
        .param("tabId", json!(tab_id))
        .param(
            "interaction",
            json!({
                "action": req.action,
                "selector": req.selector,
                "value": req.value,
                "timeout": req.timeout,
            }),
        );
    Ok(Json(state.relay.call(command, None).await?))
}

fn default_format() -> String {
    "html".to_string()
}

fn default_strategy() -> String {
    "text".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ContentQuery {
    /// "html" or "markdown".
    #[serde(default = "default_format")]
    pub format: String,
    /// Conversion strategy when `format=markdown`: text, rich, or auto.
    #[serde(default = "default_strategy")]
    pub method: String,
    /// Strip scripts/styles/comments before conversion.
    #[serde(default = "default_true")]
    pub clean: bool,
}

/// `GET /tab/{tab_id}/content` — extract tab content, optionally converted
/// to Markdown on the server side.
pub async fn tab_content(
    State(state): State<AppState>,
    Path(tab_id): Path<i64>,
    Query(query): Query<ContentQuery>,
) -> Response {
    let command = CommandFrame::new(actions::ACTION_GET_CONTENT)
        .param("tabId", json!(tab_id))
        .param("format", json!(query.format));

    let response = match state.relay.call(command, None).await {
        Ok(response) => response,
        Err(err) => return err.into_response(),
    };

    if query.format != "markdown" {
        return Json(response).into_response();
    }

    let strategy = match query.method.parse::<Strategy>() {
        Ok(strategy) => strategy,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, err.to_string()),
    };

    let content = response.field("content").cloned().unwrap_or(Value::Null);
    let html = content
        .get("bodyHtml")
        .and_then(Value::as_str)
        .or_else(|| content.get("html").and_then(Value::as_str));
    let Some(html) = html else {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "No HTML content available",
        );
    };

    match markdown::convert(html, strategy, query.clean) {
        Ok(conversion) => Json(json!({
            "success": true,
            "content": {
                "format": "markdown",
                "markdown": conversion.markdown,
                "html": html,
                "url": content.get("url"),
                "title": content.get("title"),
                "timestamp": content.get("timestamp"),
                "conversion": {
                    "method": query.method,
                    "length": conversion.length,
                    "lines": conversion.lines,
                    "metadata": conversion.metadata,
                }
            }
        }))
        .into_response(),
        Err(err) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Markdown conversion failed: {err}"),
        ),
    }
}
