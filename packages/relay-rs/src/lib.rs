//! # Relay
//!
//! Message-passing plumbing between the control panel and the page agent:
//! a broadcast bus, a stateless relay, and a correlation layer that pairs
//! commands with their replies by request ID.
//!
//! ## Architecture
//!
//! ```text
//! Orchestrator / Panel
//!     │ execute(cmd + requestId)
//!     ▼
//! CorrelationClient ── register ──► PendingRequests
//!     │ emit_command()                    ▲
//!     ▼                                   │ resolve(id, result)
//! panel MessageBus ◄──── result pump ─────┘
//!     │                ▲
//!     ▼ forward        │ forward
//!   Relay ─────────────┘
//!     │
//!     ▼
//! page MessageBus ◄──► DomAgent (page-agent crate)
//! ```
//!
//! ## Guarantees
//!
//! - **Fire-and-forget transport**: at-most-once, unordered, in-memory
//! - **Exactly-once resolution** per request ID; duplicates are no-ops
//! - **Late replies are safe**: results with no pending request are dropped
//! - The relay holds no protocol state and performs no correlation

pub mod bus;
pub mod correlation;
pub mod error;
pub mod protocol;
pub mod relay;

pub use bus::{BusMessage, MessageBus};
pub use correlation::{spawn_result_pump, CorrelationClient, PendingRequests};
pub use error::RelayError;
pub use protocol::{Action, ExecuteResult, FetchKind, Locator, PageCommand, RequestId};
pub use relay::{Relay, RelayTrigger};
