//! The seam between the agent and whatever supplies the live page.
//!
//! The agent reads and mutates the document through this trait; activation
//! semantics (what a click does) belong to the host. Tests use
//! [`ScriptedPage`](crate::testing::ScriptedPage) to script navigation.

use anyhow::Result;

use crate::dom::{Document, NodeId};

pub trait PageHost: Send {
    fn document(&self) -> &Document;

    fn document_mut(&mut self) -> &mut Document;

    /// Invoke the element's activation behavior (a click).
    fn activate(&mut self, id: NodeId) -> Result<()>;

    /// Set the element's value.
    fn set_value(&mut self, id: NodeId, value: &str) -> Result<()>;
}

/// A fixed page: clicks activate nothing, values land in the `value`
/// attribute. Suitable for ad hoc inspection of saved pages.
pub struct StaticPage {
    doc: Document,
}

impl StaticPage {
    pub fn new(doc: Document) -> Self {
        Self { doc }
    }

    pub fn from_html(html: &str) -> Self {
        Self::new(Document::parse(html))
    }
}

impl PageHost for StaticPage {
    fn document(&self) -> &Document {
        &self.doc
    }

    fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    fn activate(&mut self, id: NodeId) -> Result<()> {
        tracing::debug!(tag = %self.doc.node(id).tag, "click on static page has no effect");
        Ok(())
    }

    fn set_value(&mut self, id: NodeId, value: &str) -> Result<()> {
        self.doc.node_mut(id).set_attr("value", value);
        Ok(())
    }
}
