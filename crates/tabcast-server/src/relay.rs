//! Relay engine that bridges HTTP callers to the extension socket.
//!
//! The extension is reachable only through one long-lived WebSocket, so the
//! relay turns that fire-and-forget duplex channel into concurrent,
//! timeout-bounded request/response calls: it owns the single current
//! [`AgentConnection`], tags each command with a fresh request identifier,
//! and parks the caller on the correlation store until the receive loop
//! resolves the call or the deadline wins.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{RwLock, mpsc};
use tracing::{error, info, warn};
use uuid::Uuid;

use tabcast_proto::{CommandFrame, Keepalive, ResponseFrame};

use crate::registry::{CallOutcome, EvictReason, PendingCall, PendingCalls, RegisterError};

/// One outbound frame queued for a connection's writer.
#[derive(Debug)]
pub enum Outbound {
    /// A correlated command destined for the extension.
    Command(CommandFrame),
    /// A keepalive reply; bypasses correlation.
    Keepalive(Keepalive),
}

/// Errors surfaced to callers of [`ExtensionRelay::call`].
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("extension not connected")]
    NotConnected,

    #[error("extension did not respond within {0:?}")]
    Timeout(Duration),

    #[error("extension reported failure: {0}")]
    Remote(String),

    #[error("connection to extension was lost")]
    ConnectionLost,

    #[error("connection to extension was replaced by a newer session")]
    ConnectionReplaced,

    #[error("duplicate request id {0}")]
    DuplicateRequestId(Uuid),
}

impl From<EvictReason> for RelayError {
    fn from(reason: EvictReason) -> Self {
        match reason {
            EvictReason::ConnectionLost => Self::ConnectionLost,
            EvictReason::ConnectionReplaced => Self::ConnectionReplaced,
        }
    }
}

/// Holds one extension session: its generation, the outbound frame channel
/// drained by the socket writer, and the pending calls issued against it.
pub struct AgentConnection {
    generation: u64,
    outbound: mpsc::Sender<Outbound>,
    pending: PendingCalls,
}

impl AgentConnection {
    fn new(generation: u64, outbound: mpsc::Sender<Outbound>) -> Self {
        Self {
            generation,
            outbound,
            pending: PendingCalls::new(),
        }
    }

    /// Generation token distinguishing this session from its predecessors.
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Queue a frame for the socket writer.
    pub async fn send(&self, frame: Outbound) -> Result<(), mpsc::error::SendError<Outbound>> {
        self.outbound.send(frame).await
    }

    /// Complete the pending call matching `id` with a response frame.
    ///
    /// Returns `false` for late, stale, or unknown identifiers; the frame
    /// is dropped in that case.
    pub async fn resolve(&self, id: Uuid, frame: ResponseFrame) -> bool {
        self.pending.resolve(id, frame).await
    }

    /// Number of calls currently awaiting a response on this session.
    pub async fn pending_count(&self) -> usize {
        self.pending.len().await
    }
}

/// Connection status snapshot for health reporting.
#[derive(Debug, Clone, Copy)]
pub struct RelayStatus {
    pub connected: bool,
    pub generation: u64,
    pub pending_calls: usize,
}

/// The command relay: at most one live extension session at any instant.
pub struct ExtensionRelay {
    current: RwLock<Option<Arc<AgentConnection>>>,
    generations: AtomicU64,
    default_timeout: Duration,
}

impl ExtensionRelay {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            current: RwLock::new(None),
            generations: AtomicU64::new(0),
            default_timeout,
        }
    }

    /// Install a new extension session and return its connection handle.
    ///
    /// A previous session, if any, is superseded rather than rejected: its
    /// pending calls are evicted with [`EvictReason::ConnectionReplaced`].
    pub async fn connect(&self, outbound: mpsc::Sender<Outbound>) -> Arc<AgentConnection> {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let conn = Arc::new(AgentConnection::new(generation, outbound));

        let previous = self.current.write().await.replace(Arc::clone(&conn));
        if let Some(previous) = previous {
            warn!(
                old_generation = previous.generation(),
                generation, "Extension reconnected; superseding previous session"
            );
            previous.pending.evict_all(EvictReason::ConnectionReplaced).await;
        } else {
            info!(generation, "Extension connected");
        }
        conn
    }

    /// Tear down the session identified by `generation`.
    ///
    /// A stale generation (the session was already superseded) is ignored,
    /// so a lingering socket task can never clobber a newer connection.
    pub async fn disconnect(&self, generation: u64) {
        let removed = {
            let mut current = self.current.write().await;
            match current.as_ref() {
                Some(conn) if conn.generation() == generation => current.take(),
                _ => None,
            }
        };

        match removed {
            Some(conn) => {
                info!(generation, "Extension disconnected");
                conn.pending.evict_all(EvictReason::ConnectionLost).await;
            }
            None => {
                tracing::debug!(generation, "Ignoring disconnect for superseded session");
            }
        }
    }

    /// Send `command` to the extension and wait for the matching response.
    ///
    /// Fails immediately with [`RelayError::NotConnected`] when no session
    /// is live — it never waits for a connection to appear. The pending
    /// slot is always released on exit, whether the call succeeds, times
    /// out, or errors.
    pub async fn call(
        &self,
        command: CommandFrame,
        timeout: Option<Duration>,
    ) -> Result<ResponseFrame, RelayError> {
        let conn = self
            .current()
            .await
            .ok_or(RelayError::NotConnected)?;

        let request_id = Uuid::new_v4();
        let mut frame = command;
        frame.request_id = Some(request_id);
        let action = frame.action.clone();

        let call = self.register(&conn, request_id, &action).await?;

        if conn.send(Outbound::Command(frame)).await.is_err() {
            // Writer is gone; the disconnect teardown is already under way.
            conn.pending.discard(request_id).await;
            return Err(RelayError::NotConnected);
        }

        let deadline = timeout.unwrap_or(self.default_timeout);
        match conn.pending.await_result(call, deadline).await {
            CallOutcome::Response(response) if response.success => Ok(response),
            CallOutcome::Response(response) => Err(RelayError::Remote(
                response
                    .error
                    .unwrap_or_else(|| "unknown error from extension".to_string()),
            )),
            CallOutcome::Evicted(reason) => Err(reason.into()),
            CallOutcome::TimedOut => {
                warn!(
                    %request_id,
                    action,
                    timeout_secs = deadline.as_secs_f64(),
                    "Extension did not respond in time"
                );
                Err(RelayError::Timeout(deadline))
            }
        }
    }

    /// Connection status for the health endpoints.
    pub async fn status(&self) -> RelayStatus {
        match self.current().await {
            Some(conn) => RelayStatus {
                connected: true,
                generation: conn.generation(),
                pending_calls: conn.pending_count().await,
            },
            None => RelayStatus {
                connected: false,
                generation: 0,
                pending_calls: 0,
            },
        }
    }

    async fn current(&self) -> Option<Arc<AgentConnection>> {
        self.current.read().await.clone()
    }

    async fn register(
        &self,
        conn: &AgentConnection,
        request_id: Uuid,
        action: &str,
    ) -> Result<PendingCall, RelayError> {
        match conn.pending.register(request_id).await {
            Ok(call) => Ok(call),
            Err(RegisterError::Duplicate) => {
                // UUIDs colliding means identifier generation is broken.
                error!(%request_id, action, "Request id collision in correlation store");
                Err(RelayError::DuplicateRequestId(request_id))
            }
            Err(RegisterError::Closed(reason)) => Err(reason.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::time::Instant;

    use serde_json::json;
    use tabcast_proto::actions::ACTION_GET_TABS;

    use super::*;

    fn relay() -> Arc<ExtensionRelay> {
        Arc::new(ExtensionRelay::new(Duration::from_secs(5)))
    }

    async fn connect(relay: &ExtensionRelay) -> (Arc<AgentConnection>, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(16);
        let conn = relay.connect(tx).await;
        (conn, rx)
    }

    fn ok_response(id: Uuid, data: &str) -> ResponseFrame {
        let mut body = serde_json::Map::new();
        body.insert("data".to_string(), json!(data));
        ResponseFrame {
            request_id: Some(id),
            success: true,
            error: None,
            body,
        }
    }

    async fn next_command(rx: &mut mpsc::Receiver<Outbound>) -> CommandFrame {
        match rx.recv().await.unwrap() {
            Outbound::Command(frame) => frame,
            Outbound::Keepalive(k) => panic!("unexpected keepalive {k:?}"),
        }
    }

    #[tokio::test]
    async fn call_returns_matching_response() {
        let relay = relay();
        let (conn, mut rx) = connect(&relay).await;

        let responder = tokio::spawn(async move {
            let frame = next_command(&mut rx).await;
            let id = frame.request_id.unwrap();
            assert!(conn.resolve(id, ok_response(id, "ok")).await);
        });

        let response = relay
            .call(CommandFrame::new(ACTION_GET_TABS), None)
            .await
            .unwrap();
        assert_eq!(response.field("data"), Some(&json!("ok")));
        responder.await.unwrap();

        assert_eq!(relay.status().await.pending_calls, 0);
    }

    #[tokio::test]
    async fn call_without_connection_fails_immediately() {
        let relay = relay();
        let started = Instant::now();
        let err = relay
            .call(CommandFrame::new(ACTION_GET_TABS), None)
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::NotConnected));
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn call_times_out_and_releases_the_slot() {
        let relay = relay();
        let (_conn, _rx) = connect(&relay).await;

        let timeout = Duration::from_millis(50);
        let err = relay
            .call(CommandFrame::new(ACTION_GET_TABS), Some(timeout))
            .await
            .unwrap_err();

        match err {
            RelayError::Timeout(d) => assert_eq!(d, timeout),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(relay.status().await.pending_calls, 0);
    }

    #[tokio::test]
    async fn disconnect_evicts_every_pending_call() {
        let relay = relay();
        let (conn, mut rx) = connect(&relay).await;
        let generation = conn.generation();

        let mut calls = Vec::new();
        for _ in 0..3 {
            let relay = Arc::clone(&relay);
            calls.push(tokio::spawn(async move {
                relay.call(CommandFrame::new(ACTION_GET_TABS), None).await
            }));
        }

        // All three are registered once their commands reach the transport.
        for _ in 0..3 {
            let _ = next_command(&mut rx).await;
        }
        relay.disconnect(generation).await;

        for call in calls {
            let err = call.await.unwrap().unwrap_err();
            assert!(matches!(err, RelayError::ConnectionLost), "got {err:?}");
        }

        let status = relay.status().await;
        assert!(!status.connected);
        assert_eq!(status.pending_calls, 0);
    }

    #[tokio::test]
    async fn reconnect_supersedes_previous_session() {
        let relay = relay();
        let (_conn1, mut rx1) = connect(&relay).await;

        let pending = {
            let relay = Arc::clone(&relay);
            tokio::spawn(async move {
                relay.call(CommandFrame::new(ACTION_GET_TABS), None).await
            })
        };
        let _ = next_command(&mut rx1).await;

        let (conn2, _rx2) = connect(&relay).await;

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, RelayError::ConnectionReplaced), "got {err:?}");

        let status = relay.status().await;
        assert!(status.connected);
        assert_eq!(status.generation, conn2.generation());
    }

    #[tokio::test]
    async fn stale_generation_response_is_dropped() {
        let relay = relay();
        let (conn1, mut rx1) = connect(&relay).await;
        let generation = conn1.generation();

        let pending = {
            let relay = Arc::clone(&relay);
            tokio::spawn(async move {
                relay.call(CommandFrame::new(ACTION_GET_TABS), None).await
            })
        };
        let frame = next_command(&mut rx1).await;
        let stale_id = frame.request_id.unwrap();

        relay.disconnect(generation).await;
        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, RelayError::ConnectionLost));

        // The response shows up under the next session's transport.
        let (conn2, _rx2) = connect(&relay).await;
        assert!(!conn2.resolve(stale_id, ok_response(stale_id, "late")).await);
        assert_eq!(relay.status().await.pending_calls, 0);
    }

    #[tokio::test]
    async fn response_after_timeout_is_dropped() {
        let relay = relay();
        let (conn, mut rx) = connect(&relay).await;

        let err = relay
            .call(CommandFrame::new(ACTION_GET_TABS), Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Timeout(_)));

        let frame = next_command(&mut rx).await;
        let id = frame.request_id.unwrap();
        assert!(!conn.resolve(id, ok_response(id, "late")).await);
    }

    #[tokio::test]
    async fn concurrent_calls_never_cross_results() {
        let relay = relay();
        let (conn, mut rx) = connect(&relay).await;

        let responder = tokio::spawn(async move {
            // Collect every command first, then answer in reverse order so
            // responses come back out of order relative to the sends.
            let mut frames = Vec::new();
            for _ in 0..8 {
                frames.push(next_command(&mut rx).await);
            }
            for frame in frames.into_iter().rev() {
                let id = frame.request_id.unwrap();
                assert!(conn.resolve(id, ok_response(id, &id.to_string())).await);
            }
        });

        let mut calls = Vec::new();
        for _ in 0..8 {
            let relay = Arc::clone(&relay);
            calls.push(tokio::spawn(async move {
                relay.call(CommandFrame::new(ACTION_GET_TABS), None).await
            }));
        }

        for call in calls {
            let response = call.await.unwrap().unwrap();
            let own_id = response.request_id.unwrap().to_string();
            assert_eq!(response.field("data"), Some(&json!(own_id)));
        }
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn send_failure_maps_to_not_connected() {
        let relay = relay();
        let (tx, rx) = mpsc::channel(16);
        let _conn = relay.connect(tx).await;
        drop(rx);

        let err = relay
            .call(CommandFrame::new(ACTION_GET_TABS), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::NotConnected));
        assert_eq!(relay.status().await.pending_calls, 0);
    }

    #[tokio::test]
    async fn remote_failure_carries_the_extension_message() {
        let relay = relay();
        let (conn, mut rx) = connect(&relay).await;

        let responder = tokio::spawn(async move {
            let frame = next_command(&mut rx).await;
            let id = frame.request_id.unwrap();
            let response = ResponseFrame {
                request_id: Some(id),
                success: false,
                error: Some("no tab with id 42".to_string()),
                body: serde_json::Map::new(),
            };
            assert!(conn.resolve(id, response).await);
        });

        let err = relay
            .call(CommandFrame::new(ACTION_GET_TABS), None)
            .await
            .unwrap_err();
        match err {
            RelayError::Remote(message) => assert_eq!(message, "no tab with id 42"),
            other => panic!("expected remote error, got {other:?}"),
        }
        responder.await.unwrap();
    }
}
