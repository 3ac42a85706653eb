//! Wire types for the tabcast agent protocol.
//!
//! The server and the browser extension exchange discrete JSON frames over
//! a single WebSocket:
//!
//! - [`CommandFrame`] — server → extension, tagged with a `requestId`.
//! - [`ResponseFrame`] — extension → server, carrying the same `requestId`
//!   plus a `success` flag and action-specific result fields.
//! - [`Keepalive`] — either direction, bypasses request correlation.
//!
//! Field names follow the extension protocol and are camelCase on the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub mod actions;

/// Keepalive frame. A `ping` is answered with a `pong`; neither carries a
/// request identifier and neither touches the correlation store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Keepalive {
    Ping,
    Pong,
}

/// One command sent to the extension.
///
/// The relay engine fills in `request_id` immediately before sending; route
/// handlers build untagged frames with [`CommandFrame::new`] and
/// [`CommandFrame::param`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandFrame {
    /// Action name, one of the [`actions`] constants.
    pub action: String,
    /// Correlation identifier, unique per in-flight command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
    /// Action-specific parameters, flattened into the frame object.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl CommandFrame {
    /// Create an untagged command frame for `action`.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            request_id: None,
            params: Map::new(),
        }
    }

    /// Attach an action-specific parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// One response received from the extension.
///
/// Deserialization is deliberately permissive: every field is optional so
/// that a malformed-but-parseable frame can still be inspected (and then
/// dropped) by the dispatch loop instead of erroring the connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseFrame {
    /// Correlation identifier echoed back by the extension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
    /// Whether the extension executed the command successfully.
    #[serde(default)]
    pub success: bool,
    /// Error text supplied by the extension when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Action-specific result fields, flattened into the frame object.
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl ResponseFrame {
    /// Look up an action-specific result field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn command_frame_serializes_camel_case() {
        let id = Uuid::new_v4();
        let mut frame = CommandFrame::new(actions::ACTION_NAVIGATE_TAB)
            .param("tabId", json!(7))
            .param("url", json!("https://example.com"));
        frame.request_id = Some(id);

        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["action"], "navigateTab");
        assert_eq!(value["requestId"], json!(id.to_string()));
        assert_eq!(value["tabId"], 7);
        assert_eq!(value["url"], "https://example.com");
    }

    #[test]
    fn untagged_frame_omits_request_id() {
        let frame = CommandFrame::new(actions::ACTION_GET_ACTIVE_TAB);
        let text = serde_json::to_string(&frame).unwrap();
        assert!(!text.contains("requestId"));
    }

    #[test]
    fn response_frame_roundtrip() {
        let id = Uuid::new_v4();
        let text = format!(
            r#"{{"requestId":"{id}","success":true,"tabs":[{{"id":1,"url":"https://example.com"}}]}}"#
        );
        let frame: ResponseFrame = serde_json::from_str(&text).unwrap();
        assert_eq!(frame.request_id, Some(id));
        assert!(frame.success);
        assert!(frame.field("tabs").unwrap().is_array());
    }

    #[test]
    fn response_frame_tolerates_missing_fields() {
        let frame: ResponseFrame = serde_json::from_str("{}").unwrap();
        assert_eq!(frame.request_id, None);
        assert!(!frame.success);
        assert_eq!(frame.error, None);
    }

    #[test]
    fn keepalive_ping_parses() {
        let frame: Keepalive = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(frame, Keepalive::Ping);
        assert_eq!(
            serde_json::to_string(&Keepalive::Pong).unwrap(),
            r#"{"type":"pong"}"#
        );
    }

    #[test]
    fn response_frame_is_not_a_keepalive() {
        assert!(serde_json::from_str::<Keepalive>(r#"{"requestId":"x","success":true}"#).is_err());
    }
}
