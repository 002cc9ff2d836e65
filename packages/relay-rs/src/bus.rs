//! Broadcast message bus for the page-control protocol.
//!
//! # Guarantees
//!
//! - **Fire-and-forget**: emitting never waits for receivers
//! - **At-most-once delivery**: slow receivers may miss messages
//! - **In-memory only**: nothing is persisted, lagged receivers get
//!   `RecvError::Lagged`
//! - **Unordered by contract**: correctness of request/response pairing
//!   relies on [`RequestId`](crate::protocol::RequestId) matching, never on
//!   delivery order

use tokio::sync::broadcast;

use crate::protocol::{ExecuteResult, PageCommand};

/// Default channel capacity for a bus.
const DEFAULT_CAPACITY: usize = 1024;

/// A message on the bus: either a command heading for the page agent or a
/// result heading back to the control panel. Both directions share one
/// broadcast channel per side, so every listener sees all traffic.
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    Command(PageCommand),
    Result(ExecuteResult),
}

/// Clone-able handle to one side's broadcast channel.
#[derive(Clone)]
pub struct MessageBus {
    sender: broadcast::Sender<BusMessage>,
}

impl MessageBus {
    /// Create a bus with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with a specific buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast a command. Returns the number of receivers that got it.
    pub fn emit_command(&self, command: PageCommand) -> usize {
        self.sender.send(BusMessage::Command(command)).unwrap_or(0)
    }

    /// Broadcast a result. Returns the number of receivers that got it.
    pub fn emit_result(&self, result: ExecuteResult) -> usize {
        self.sender.send(BusMessage::Result(result)).unwrap_or(0)
    }

    /// Subscribe to all traffic emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
