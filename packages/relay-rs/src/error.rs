//! Error taxonomy for the correlation layer.
//!
//! # The boundary rule
//!
//! Agent-side faults never cross the bus as Rust errors. The page agent
//! catches every fault and carries it in the reply payload
//! (`ExecuteResult { success: false, error }`). `RelayError` covers only
//! what can go wrong on the control-panel side of the channel: timeouts,
//! closed buses, and dropped resolvers.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the correlation layer.
#[derive(Debug, Error)]
pub enum RelayError {
    /// No result arrived for the request within the configured window.
    #[error("request timed out after {after:?}")]
    Timeout { after: Duration },

    /// The bus shut down before the request could be transmitted or
    /// answered.
    #[error("message bus closed")]
    BusClosed,

    /// The pending request was dropped before a result resolved it.
    #[error("request cancelled before a result arrived")]
    Cancelled,
}
