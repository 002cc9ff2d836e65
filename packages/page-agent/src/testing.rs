//! Scripted pages for tests: clicks can swap the document, so workflows
//! can walk list → detail → list transitions without a browser.

use std::collections::VecDeque;

use anyhow::Result;
use relay::protocol::Locator;

use crate::dom::{Document, NodeId};
use crate::host::PageHost;
use crate::locator::resolve;

struct ClickRule {
    locator: Locator,
    /// Each matching click consumes the next page. An exhausted rule
    /// leaves the document unchanged.
    next_pages: VecDeque<String>,
}

/// A page whose click behavior is scripted per element.
pub struct ScriptedPage {
    doc: Document,
    rules: Vec<ClickRule>,
    /// Tags of every activated element, in click order.
    pub click_log: Vec<String>,
    /// `(tag, value)` for every set_value call, in order.
    pub value_log: Vec<(String, String)>,
}

impl ScriptedPage {
    pub fn new(html: &str) -> Self {
        Self {
            doc: Document::parse(html),
            rules: Vec::new(),
            click_log: Vec::new(),
            value_log: Vec::new(),
        }
    }

    /// Clicking the element the locator resolves to (at click time) swaps
    /// the document for the next page in the list.
    pub fn on_click(mut self, locator: Locator, next_pages: Vec<&str>) -> Self {
        self.rules.push(ClickRule {
            locator,
            next_pages: next_pages.into_iter().map(String::from).collect(),
        });
        self
    }
}

impl PageHost for ScriptedPage {
    fn document(&self) -> &Document {
        &self.doc
    }

    fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    fn activate(&mut self, id: NodeId) -> Result<()> {
        self.click_log.push(self.doc.node(id).tag.clone());

        let next = self.rules.iter_mut().find_map(|rule| {
            if resolve(&self.doc, &rule.locator) == Some(id) {
                rule.next_pages.pop_front()
            } else {
                None
            }
        });
        if let Some(html) = next {
            self.doc = Document::parse(&html);
        }
        Ok(())
    }

    fn set_value(&mut self, id: NodeId, value: &str) -> Result<()> {
        self.value_log
            .push((self.doc.node(id).tag.clone(), value.to_string()));
        self.doc.node_mut(id).set_attr("value", value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_swaps_document() {
        let mut page = ScriptedPage::new("<body><button class=\"go\">Go</button></body>")
            .on_click(
                Locator::new("button", "class", "go"),
                vec!["<body><h1 class=\"done\">Done</h1></body>"],
            );

        let button = resolve(page.document(), &Locator::new("button", "class", "go")).unwrap();
        page.activate(button).unwrap();

        assert!(resolve(page.document(), &Locator::new("h1", "class", "done")).is_some());
        assert_eq!(page.click_log, vec!["button"]);
    }

    #[test]
    fn test_exhausted_rule_leaves_document() {
        let mut page = ScriptedPage::new("<body><button class=\"go\">Go</button></body>")
            .on_click(Locator::new("button", "class", "go"), vec![]);

        let button = resolve(page.document(), &Locator::new("button", "class", "go")).unwrap();
        page.activate(button).unwrap();

        // Still the original page.
        assert!(resolve(page.document(), &Locator::new("button", "class", "go")).is_some());
    }
}
