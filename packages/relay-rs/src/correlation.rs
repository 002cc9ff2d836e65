//! Request/response correlation over the fire-and-forget bus.
//!
//! The transport is broadcast-based and unordered; pairing a command with
//! its reply relies entirely on [`RequestId`] matching. The layer keeps an
//! explicit table of `RequestId -> completion handle` so resolution is a
//! pure lookup, independent of the transport, and unit-testable without a
//! real bus.
//!
//! # Invariants
//!
//! - At most one pending request per live request ID
//! - Resolution is exactly-once: a second result for an already-resolved ID
//!   is a no-op
//! - A result whose ID has no pending request is dropped silently (late and
//!   duplicate replies are safe)

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

use crate::bus::{BusMessage, MessageBus};
use crate::error::RelayError;
use crate::protocol::{Action, ExecuteResult, FetchKind, Locator, PageCommand, RequestId};

struct Pending {
    tx: oneshot::Sender<ExecuteResult>,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
}

/// Table of outstanding correlated commands awaiting their reply.
#[derive(Default)]
pub struct PendingRequests {
    inner: Mutex<HashMap<RequestId, Pending>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh request and return the handle its result will
    /// arrive on. Must be called before the command is transmitted.
    pub fn register(&self, id: RequestId) -> oneshot::Receiver<ExecuteResult> {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.inner.lock().expect("pending table poisoned");
        inner.insert(
            id,
            Pending {
                tx,
                created_at: Utc::now(),
            },
        );
        rx
    }

    /// Complete the pending request matching this result, if one exists.
    ///
    /// Returns `true` when a waiter was resolved. Unknown IDs - late
    /// replies, duplicates, results for requests that already timed out -
    /// return `false` and have no other effect.
    pub fn resolve(&self, result: ExecuteResult) -> bool {
        let pending = {
            let mut inner = self.inner.lock().expect("pending table poisoned");
            inner.remove(&result.request_id)
        };
        match pending {
            // The receiver may have been dropped (timeout); that is fine.
            Some(p) => p.tx.send(result).is_ok(),
            None => false,
        }
    }

    /// Drop a pending request without resolving it (timeout cleanup).
    pub fn remove(&self, id: RequestId) {
        let mut inner = self.inner.lock().expect("pending table poisoned");
        inner.remove(&id);
    }

    /// Number of requests still awaiting a reply.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("pending table poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Control-panel side client: sends commands and awaits correlated replies.
#[derive(Clone)]
pub struct CorrelationClient {
    bus: MessageBus,
    pending: Arc<PendingRequests>,
}

impl CorrelationClient {
    /// Create a client and start its result pump on the given bus.
    pub fn new(bus: MessageBus) -> Self {
        let pending = Arc::new(PendingRequests::new());
        spawn_result_pump(&bus, Arc::clone(&pending));
        Self { bus, pending }
    }

    /// The underlying bus handle.
    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// The pending-request table (exposed for diagnostics and tests).
    pub fn pending(&self) -> &Arc<PendingRequests> {
        &self.pending
    }

    /// Send a fire-and-forget command. No reply will arrive.
    pub fn send_uncorrelated(&self, command: PageCommand) {
        self.bus.emit_command(command);
    }

    /// Send a correlated `Execute` command and await its result.
    ///
    /// Registers the pending request before emitting so a fast reply cannot
    /// race the registration.
    pub async fn execute(
        &self,
        locator: Locator,
        action: Action,
        value: Option<String>,
        fetch: Option<FetchKind>,
    ) -> Result<ExecuteResult, RelayError> {
        let id = RequestId::new();
        let rx = self.pending.register(id);

        self.bus.emit_command(PageCommand::Execute {
            locator,
            action,
            value,
            fetch,
            request_id: Some(id),
        });

        rx.await.map_err(|_| RelayError::Cancelled)
    }

    /// Like [`execute`](Self::execute) but rejects after `window` elapses.
    /// The pending entry is removed on timeout, so a late reply is dropped
    /// silently rather than resolving a dead future.
    pub async fn execute_timeout(
        &self,
        locator: Locator,
        action: Action,
        value: Option<String>,
        fetch: Option<FetchKind>,
        window: Duration,
    ) -> Result<ExecuteResult, RelayError> {
        let id = RequestId::new();
        let rx = self.pending.register(id);

        self.bus.emit_command(PageCommand::Execute {
            locator,
            action,
            value,
            fetch,
            request_id: Some(id),
        });

        match tokio::time::timeout(window, rx).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(RelayError::Cancelled),
            Err(_) => {
                self.pending.remove(id);
                Err(RelayError::Timeout { after: window })
            }
        }
    }

    /// Correlated fetch of an element's rendered text.
    pub async fn fetch_text(&self, locator: Locator) -> Result<ExecuteResult, RelayError> {
        self.execute(locator, Action::Fetch, None, Some(FetchKind::Text))
            .await
    }

    /// Correlated fetch of an element's serialized markup.
    pub async fn fetch_content(&self, locator: Locator) -> Result<ExecuteResult, RelayError> {
        self.execute(locator, Action::Fetch, None, Some(FetchKind::Content))
            .await
    }

    /// Correlated click.
    pub async fn click(&self, locator: Locator) -> Result<ExecuteResult, RelayError> {
        self.execute(locator, Action::Click, None, None).await
    }
}

/// Pump every result on the bus into the pending table.
///
/// Runs until the bus closes. Lagged receivers log and continue; a missed
/// result then surfaces as a timeout on the waiter, not a hang forever,
/// when the caller used [`CorrelationClient::execute_timeout`].
pub fn spawn_result_pump(bus: &MessageBus, pending: Arc<PendingRequests>) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(BusMessage::Result(result)) => {
                    let id = result.request_id;
                    if !pending.resolve(result) {
                        tracing::debug!(request_id = %id, "dropping result with no pending request");
                    }
                }
                Ok(BusMessage::Command(_)) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "result pump lagged, replies may be missed");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
