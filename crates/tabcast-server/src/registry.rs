//! In-memory correlation store for in-flight extension commands.
//!
//! Each connected extension session owns one [`PendingCalls`] store mapping
//! request identifiers to completion slots. The store is the single point
//! where a response, a timeout, or an eviction may finish a call, and it
//! guarantees that exactly one of them wins.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{Mutex, oneshot};
use uuid::Uuid;

use tabcast_proto::ResponseFrame;

/// Why pending calls were completed without a response from the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictReason {
    /// The owning connection closed.
    ConnectionLost,
    /// A new extension session superseded the owning connection.
    ConnectionReplaced,
}

/// Terminal state written into a pending call's completion slot.
#[derive(Debug)]
enum Completion {
    Response(ResponseFrame),
    Evicted(EvictReason),
}

/// Outcome of awaiting a registered call.
#[derive(Debug)]
pub enum CallOutcome {
    /// A response frame with the matching request identifier arrived.
    Response(ResponseFrame),
    /// The owning connection was invalidated while the call was in flight.
    Evicted(EvictReason),
    /// The deadline elapsed before a response arrived.
    TimedOut,
}

/// Failure to register a pending call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    /// The identifier is already in flight. Identifiers are generated
    /// fresh per call, so this indicates a bug in the caller.
    Duplicate,
    /// The store was already evicted; the owning connection is gone.
    Closed(EvictReason),
}

/// Caller-side handle for one registered call.
///
/// Holds the receiving end of the completion slot; the store keeps the
/// sending end until the call is resolved, discarded, or evicted.
#[derive(Debug)]
pub struct PendingCall {
    id: Uuid,
    rx: oneshot::Receiver<Completion>,
}

impl PendingCall {
    pub const fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Default)]
struct Inner {
    waiting: HashMap<Uuid, oneshot::Sender<Completion>>,
    closed: Option<EvictReason>,
}

/// Thread-safe registry of pending calls for one connection generation.
#[derive(Default)]
pub struct PendingCalls {
    inner: Mutex<Inner>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending call and return the handle used to await it.
    ///
    /// Fails if `id` is already in flight or the store has been evicted;
    /// in the latter case the eviction reason is returned so a racing
    /// caller never waits on a store nothing will ever resolve.
    pub async fn register(&self, id: Uuid) -> Result<PendingCall, RegisterError> {
        let mut inner = self.inner.lock().await;
        if let Some(reason) = inner.closed {
            return Err(RegisterError::Closed(reason));
        }
        if inner.waiting.contains_key(&id) {
            return Err(RegisterError::Duplicate);
        }
        let (tx, rx) = oneshot::channel();
        inner.waiting.insert(id, tx);
        Ok(PendingCall { id, rx })
    }

    /// Complete a pending call with a response frame.
    ///
    /// Returns `false` if `id` is unknown — a late or stale response; the
    /// frame is dropped and the caller decides whether to log it.
    pub async fn resolve(&self, id: Uuid, frame: ResponseFrame) -> bool {
        let Some(tx) = self.inner.lock().await.waiting.remove(&id) else {
            return false;
        };
        // The receiver may already be gone if the awaiting task was
        // cancelled; the entry is removed either way.
        let _ = tx.send(Completion::Response(frame));
        true
    }

    /// Remove a registered call without completing it.
    ///
    /// Used when the send of the command itself failed and no response can
    /// ever arrive.
    pub async fn discard(&self, id: Uuid) -> bool {
        self.inner.lock().await.waiting.remove(&id).is_some()
    }

    /// Atomically remove every pending call and complete each with `reason`.
    ///
    /// Marks the store closed under the same lock, so no call can be
    /// registered after eviction begins. The first eviction reason wins;
    /// repeated calls are no-ops.
    pub async fn evict_all(&self, reason: EvictReason) {
        let mut inner = self.inner.lock().await;
        if inner.closed.is_none() {
            inner.closed = Some(reason);
        }
        for (_, tx) in inner.waiting.drain() {
            let _ = tx.send(Completion::Evicted(reason));
        }
    }

    /// Await the completion of a registered call, bounded by `deadline`.
    ///
    /// On expiry the entry is removed (if still waiting) and `TimedOut` is
    /// reported; a response racing with the deadline is decided by whoever
    /// takes the completion slot first.
    pub async fn await_result(&self, call: PendingCall, deadline: Duration) -> CallOutcome {
        match tokio::time::timeout(deadline, call.rx).await {
            Ok(Ok(Completion::Response(frame))) => CallOutcome::Response(frame),
            Ok(Ok(Completion::Evicted(reason))) => CallOutcome::Evicted(reason),
            // Sender dropped without completing: the store itself went away.
            Ok(Err(_)) => CallOutcome::Evicted(EvictReason::ConnectionLost),
            Err(_) => {
                self.discard(call.id).await;
                CallOutcome::TimedOut
            }
        }
    }

    /// Number of calls currently waiting.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.waiting.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.waiting.is_empty()
    }
}
