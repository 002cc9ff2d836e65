//! # Page agent
//!
//! The in-page half of the scraping pipeline: an owned document model, a
//! locator/pattern matcher, and the [`DomAgent`] that executes highlight,
//! clear, and execute commands arriving over the page-side message bus.
//!
//! The agent talks to the page through the [`PageHost`] seam; production
//! hosts supply a real document, tests use
//! [`testing::ScriptedPage`] to script navigation.

pub mod agent;
pub mod dom;
pub mod host;
pub mod locator;
pub mod testing;

pub use agent::{DomAgent, HighlightLabel};
pub use dom::{Document, DomTree, Node, NodeId};
pub use host::{PageHost, StaticPage};
pub use locator::{matches_pattern, resolve};
