//! WebSocket endpoint for the extension connection.
//!
//! One task per socket: it drains the connection's outbound channel into
//! the sink (serialising concurrent callers' writes) and reads inbound
//! frames, answering keepalives directly and dispatching responses into
//! the correlation store. When the socket ends, the session is torn down
//! under its own generation so a superseded session can never clobber a
//! newer one.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use tabcast_proto::{Keepalive, ResponseFrame};

use crate::relay::{AgentConnection, Outbound};
use crate::server::AppState;

/// `GET /ws` — upgrade handler for the extension.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| agent_session(state, socket))
}

async fn agent_session(state: AppState, mut socket: WebSocket) {
    let (tx, mut outbound_rx) = mpsc::channel(state.channel_capacity);
    let conn = state.relay.connect(tx).await;
    let generation = conn.generation();

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => {
                let Some(frame) = frame else { break };
                if !write_frame(&mut socket, &frame).await {
                    break;
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_text(&conn, text.as_str()).await {
                            if !write_frame(&mut socket, &Outbound::Keepalive(reply)).await {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(other)) => {
                        debug!(generation, ?other, "Ignoring non-text frame from extension");
                    }
                    Some(Err(e)) => {
                        warn!(generation, error = %e, "Extension socket error");
                        break;
                    }
                }
            }
        }
    }

    state.relay.disconnect(generation).await;
}

/// Serialize and send one outbound frame; returns `false` once the socket
/// is no longer writable.
async fn write_frame(socket: &mut WebSocket, frame: &Outbound) -> bool {
    let text = match frame {
        Outbound::Command(command) => serde_json::to_string(command),
        Outbound::Keepalive(keepalive) => serde_json::to_string(keepalive),
    };
    match text {
        Ok(text) => socket.send(Message::Text(text.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to serialize outbound frame");
            true
        }
    }
}

/// Handle one inbound text frame; returns a keepalive reply to send, if any.
async fn handle_text(conn: &AgentConnection, text: &str) -> Option<Keepalive> {
    match serde_json::from_str::<Keepalive>(text) {
        Ok(Keepalive::Ping) => return Some(Keepalive::Pong),
        Ok(Keepalive::Pong) => return None,
        Err(_) => {}
    }

    match serde_json::from_str::<ResponseFrame>(text) {
        Ok(frame) => match frame.request_id {
            Some(id) => {
                if !conn.resolve(id, frame).await {
                    warn!(
                        request_id = %id,
                        generation = conn.generation(),
                        "Dropping response with no pending call"
                    );
                }
            }
            None => {
                warn!(
                    generation = conn.generation(),
                    "Dropping response frame without request id"
                );
            }
        },
        Err(e) => {
            warn!(
                generation = conn.generation(),
                error = %e,
                "Dropping malformed frame from extension"
            );
        }
    }
    None
}
