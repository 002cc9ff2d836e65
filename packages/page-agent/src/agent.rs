//! The DOM agent: executes highlight/clear/execute commands against the
//! page it was injected into.
//!
//! All highlight state is owned by the agent instance - sequence counter,
//! saved styles, labels - with an explicit lifecycle (`highlight`, `clear`,
//! drop). Independent agents never collide.
//!
//! Faults never cross the message boundary: every failure during
//! resolution, activation, or reading is caught and reported as
//! `ExecuteResult { success: false, error }`.

use relay::bus::{BusMessage, MessageBus};
use relay::protocol::{Action, ExecuteResult, FetchKind, Locator, PageCommand, RequestId};
use tokio::sync::broadcast;

use crate::dom::{DomTree, NodeId};
use crate::host::PageHost;
use crate::locator::resolve;

/// Outline applied to elements classified as interactive.
const INTERACTIVE_OUTLINE: &str = "outline: 2px solid #e11d48";
/// Outline applied to everything else visible.
const PASSIVE_OUTLINE: &str = "outline: 1px dashed #64748b";

/// Tags treated as interactive regardless of attributes.
const INTERACTIVE_TAGS: &[&str] = &["a", "button", "input", "textarea", "select", "summary"];
/// ARIA roles treated as interactive.
const INTERACTIVE_ROLES: &[&str] = &["button", "link", "checkbox", "menuitem", "tab", "textbox"];

/// Floating overlay label attached to one highlighted element.
#[derive(Debug, Clone)]
pub struct HighlightLabel {
    pub seq: u32,
    pub text: String,
}

struct HighlightEntry {
    node: NodeId,
    /// Full inline style before the outline was applied; `None` when the
    /// element had no style attribute.
    saved_style: Option<String>,
    label: HighlightLabel,
}

pub struct DomAgent<H: PageHost> {
    host: H,
    seq: u32,
    entries: Vec<HighlightEntry>,
    /// Stamp of the document the current entries index into.
    highlighted_stamp: u64,
    snapshot: Option<DomTree>,
}

impl<H: PageHost> DomAgent<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            seq: 0,
            entries: Vec::new(),
            highlighted_stamp: 0,
            snapshot: None,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    /// The body tree captured by the last highlight, for diagnostics.
    pub fn snapshot(&self) -> Option<&DomTree> {
        self.snapshot.as_ref()
    }

    /// Current overlay labels, in sequence order.
    pub fn labels(&self) -> impl Iterator<Item = &HighlightLabel> {
        self.entries.iter().map(|e| &e.label)
    }

    /// Highlight every visible element on the page.
    ///
    /// Clears any existing overlay first, then re-scans the entire
    /// document (not just locator matches), outlining interactive and
    /// passive elements distinctly and numbering each with a label. Also
    /// captures the serialized body tree.
    pub fn highlight(&mut self, _locator: &Locator) {
        self.clear();
        self.highlighted_stamp = self.host.document().stamp();

        let targets: Vec<(NodeId, bool)> = {
            let doc = self.host.document();
            doc.iter()
                .filter(|&id| doc.is_visible(id))
                .map(|id| (id, Self::is_interactive(doc.node(id).tag.as_str(), doc.node(id).attr("role"))))
                .collect()
        };

        for (id, interactive) in targets {
            let doc = self.host.document_mut();
            let node = doc.node_mut(id);
            let saved_style = node.attr("style").map(String::from);

            let outline = if interactive {
                INTERACTIVE_OUTLINE
            } else {
                PASSIVE_OUTLINE
            };
            let style = match &saved_style {
                Some(prior) => format!("{prior}; {outline}"),
                None => outline.to_string(),
            };
            node.set_attr("style", style);

            let label = HighlightLabel {
                seq: self.seq,
                text: format!("[{}] {}", self.seq, node.tag),
            };
            self.seq += 1;
            self.entries.push(HighlightEntry {
                node: id,
                saved_style,
                label,
            });
        }

        let doc = self.host.document();
        let body = doc.find_tag("body").unwrap_or_else(|| doc.root());
        self.snapshot = Some(doc.tree(body));

        tracing::debug!(highlighted = self.entries.len(), "highlight applied");
    }

    /// Remove all labels, restore every saved style, reset the counter.
    /// Idempotent.
    pub fn clear(&mut self) {
        // Entries index into the document that was live at highlight time;
        // after a swap the same indices name different elements, so a
        // replaced document gets nothing restored onto it.
        let same_doc = self.host.document().stamp() == self.highlighted_stamp;
        for entry in self.entries.drain(..) {
            if !same_doc {
                continue;
            }
            let node = self.host.document_mut().node_mut(entry.node);
            match entry.saved_style {
                Some(style) => node.set_attr("style", style),
                None => node.remove_attr("style"),
            }
        }
        self.seq = 0;
    }

    /// Resolve the locator and perform the action.
    ///
    /// Returns a result only when the command carried a request ID;
    /// otherwise the outcome (including "not found") is not observable.
    pub fn execute(
        &mut self,
        locator: &Locator,
        action: Action,
        value: Option<&str>,
        fetch: Option<FetchKind>,
        request_id: Option<RequestId>,
    ) -> Option<ExecuteResult> {
        let target = match resolve(self.host.document(), locator) {
            Some(id) => id,
            None => {
                tracing::debug!(locator = %locator, "locator resolved no element");
                return request_id.map(|id| ExecuteResult::fail(id, "not found"));
            }
        };

        let outcome = self.dispatch(target, action, value, fetch);
        let request_id = request_id?;
        Some(match outcome {
            Ok(data) => ExecuteResult {
                request_id,
                success: true,
                data,
                error: None,
            },
            Err(e) => ExecuteResult::fail(request_id, format!("{e:#}")),
        })
    }

    fn dispatch(
        &mut self,
        target: NodeId,
        action: Action,
        value: Option<&str>,
        fetch: Option<FetchKind>,
    ) -> anyhow::Result<Option<String>> {
        match action {
            Action::Click => {
                self.host.activate(target)?;
                Ok(None)
            }
            Action::Fill => {
                let value = value.ok_or_else(|| anyhow::anyhow!("fill requires a value"))?;
                self.host.set_value(target, value)?;
                Ok(None)
            }
            Action::TypeSmoothly => {
                // Same end state as Fill, simulated as a paced character
                // sequence. Terminal, non-retrying.
                let value = value.ok_or_else(|| anyhow::anyhow!("typeSmoothly requires a value"))?;
                for (idx, ch) in value.char_indices() {
                    self.host.set_value(target, &value[..idx + ch.len_utf8()])?;
                }
                Ok(None)
            }
            Action::Fetch => {
                let kind = fetch.ok_or_else(|| anyhow::anyhow!("fetch requires a fetchType"))?;
                let doc = self.host.document();
                let data = match kind {
                    FetchKind::Text => doc.inner_text(target),
                    FetchKind::Content => doc.outer_html(target),
                };
                Ok(Some(data))
            }
        }
    }

    /// Handle one command, returning the reply to emit (if any).
    pub fn handle(&mut self, command: PageCommand) -> Option<ExecuteResult> {
        match command {
            PageCommand::Highlight { locator } => {
                self.highlight(&locator);
                None
            }
            PageCommand::ClearHighlight => {
                self.clear();
                None
            }
            PageCommand::Execute {
                locator,
                action,
                value,
                fetch,
                request_id,
            } => self.execute(&locator, action, value.as_deref(), fetch, request_id),
        }
    }

    /// Subscription loop: handle each command to completion, emit the
    /// reply when one is due. Runs until the bus closes.
    pub async fn run(mut self, bus: MessageBus) {
        let mut rx = bus.subscribe();
        loop {
            match rx.recv().await {
                Ok(BusMessage::Command(command)) => {
                    if let Some(result) = self.handle(command) {
                        bus.emit_result(result);
                    }
                }
                Ok(BusMessage::Result(_)) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "agent lagged, commands may be missed");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!("agent stopped");
    }

    fn is_interactive(tag: &str, role: Option<&str>) -> bool {
        INTERACTIVE_TAGS.contains(&tag)
            || role.is_some_and(|r| INTERACTIVE_ROLES.contains(&r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::StaticPage;

    const PAGE: &str = "<html><body>\
        <h1 class=\"job-title-header\">Senior Engineer</h1>\
        <a class=\"apply\" href=\"/apply/42\" style=\"color: blue\">Apply now</a>\
        <div class=\"meta\" role=\"button\">More</div>\
        <input class=\"search\">\
        </body></html>";

    fn agent() -> DomAgent<StaticPage> {
        DomAgent::new(StaticPage::from_html(PAGE))
    }

    fn body_locator() -> Locator {
        Locator::new("body", "id", "?")
    }

    #[test]
    fn test_fetch_text_success() {
        let mut agent = agent();
        let id = RequestId::new();
        let result = agent
            .execute(
                &Locator::new("h1", "class", "?title?"),
                Action::Fetch,
                None,
                Some(FetchKind::Text),
                Some(id),
            )
            .unwrap();

        assert_eq!(result.request_id, id);
        assert!(result.success);
        assert_eq!(result.data.as_deref(), Some("Senior Engineer"));
    }

    #[test]
    fn test_fetch_content_returns_markup() {
        let mut agent = agent();
        let result = agent
            .execute(
                &Locator::new("a", "class", "apply"),
                Action::Fetch,
                None,
                Some(FetchKind::Content),
                Some(RequestId::new()),
            )
            .unwrap();

        let markup = result.data.unwrap();
        assert!(markup.contains("href=\"/apply/42\""));
        assert!(markup.contains("Apply now"));
    }

    #[test]
    fn test_unresolved_locator_reports_not_found() {
        let mut agent = agent();
        let result = agent
            .execute(
                &Locator::new("h2", "class", "?missing?"),
                Action::Fetch,
                None,
                Some(FetchKind::Text),
                Some(RequestId::new()),
            )
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("not found"));
    }

    #[test]
    fn test_unresolved_without_request_id_is_silent() {
        let mut agent = agent();
        let result = agent.execute(
            &Locator::new("h2", "class", "?missing?"),
            Action::Click,
            None,
            None,
            None,
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_fill_and_type_smoothly_set_value() {
        let mut agent = agent();
        let search = Locator::new("input", "class", "search");

        agent.execute(&search, Action::Fill, Some("rust"), None, None);
        let id = crate::locator::resolve(agent.host().document(), &search).unwrap();
        assert_eq!(agent.host().document().node(id).attr("value"), Some("rust"));

        let mut agent = DomAgent::new(StaticPage::from_html(PAGE));
        agent.execute(&search, Action::TypeSmoothly, Some("tokio"), None, None);
        let id = crate::locator::resolve(agent.host().document(), &search).unwrap();
        assert_eq!(agent.host().document().node(id).attr("value"), Some("tokio"));
    }

    #[test]
    fn test_fill_without_value_fails() {
        let mut agent = agent();
        let result = agent
            .execute(
                &Locator::new("input", "class", "search"),
                Action::Fill,
                None,
                None,
                Some(RequestId::new()),
            )
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("value"));
    }

    #[test]
    fn test_clear_restores_saved_styles() {
        let mut agent = agent();
        let apply = Locator::new("a", "class", "apply");
        let apply_id = crate::locator::resolve(agent.host().document(), &apply).unwrap();

        agent.highlight(&body_locator());
        assert!(agent
            .host()
            .document()
            .node(apply_id)
            .attr("style")
            .unwrap()
            .contains("outline"));

        agent.clear();
        assert_eq!(
            agent.host().document().node(apply_id).attr("style"),
            Some("color: blue")
        );

        // Elements that had no style attribute get it removed again.
        let h1 = crate::locator::resolve(
            agent.host().document(),
            &Locator::new("h1", "class", "?title?"),
        )
        .unwrap();
        assert_eq!(agent.host().document().node(h1).attr("style"), None);
    }

    #[test]
    fn test_double_clear_is_idempotent() {
        let mut agent = agent();
        agent.highlight(&body_locator());
        agent.clear();
        let styles: Vec<Option<String>> = agent
            .host()
            .document()
            .iter()
            .map(|id| agent.host().document().node(id).attr("style").map(String::from))
            .collect();

        agent.clear();
        let styles_again: Vec<Option<String>> = agent
            .host()
            .document()
            .iter()
            .map(|id| agent.host().document().node(id).attr("style").map(String::from))
            .collect();
        assert_eq!(styles, styles_again);
    }

    #[test]
    fn test_clear_after_document_swap_leaves_new_page_untouched() {
        use crate::testing::ScriptedPage;

        let go = Locator::new("button", "class", "go");
        let page = ScriptedPage::new(
            "<body><button class=\"go\" style=\"color: red\">Go</button>\
             <p style=\"color: blue\">text</p></body>",
        )
        .on_click(
            go.clone(),
            vec!["<body><h1>Done</h1><span>after</span></body>"],
        );
        let mut agent = DomAgent::new(page);

        agent.highlight(&body_locator());
        // The click swaps the document while the highlight is live.
        agent.execute(&go, Action::Click, None, None, None);
        agent.clear();

        // Saved styles from the old page never land on the new one.
        let doc = agent.host().document();
        assert!(doc.iter().all(|id| doc.node(id).attr("style").is_none()));
    }

    #[test]
    fn test_highlight_resets_sequence_and_classifies() {
        let mut agent = agent();
        agent.highlight(&body_locator());
        let first_run: Vec<u32> = agent.labels().map(|l| l.seq).collect();
        assert_eq!(first_run[0], 0);

        // A fresh highlight clears implicitly and restarts numbering.
        agent.highlight(&body_locator());
        let second_run: Vec<u32> = agent.labels().map(|l| l.seq).collect();
        assert_eq!(first_run, second_run);

        // The role="button" div counts as interactive.
        let doc = agent.host().document();
        let meta = crate::locator::resolve(doc, &Locator::new("div", "class", "meta")).unwrap();
        assert!(doc.node(meta).attr("style").unwrap().contains("2px solid"));
    }

    #[test]
    fn test_highlight_captures_body_snapshot() {
        let mut agent = agent();
        assert!(agent.snapshot().is_none());
        agent.highlight(&body_locator());
        let tree = agent.snapshot().unwrap();
        assert_eq!(tree.tag, "body");
        assert!(!tree.children.is_empty());
    }

    #[tokio::test]
    async fn test_run_loop_end_to_end() {
        let bus = MessageBus::new();
        let agent = agent();
        tokio::spawn(agent.run(bus.clone()));
        tokio::task::yield_now().await;

        let mut rx = bus.subscribe();
        let r1 = RequestId::new();
        bus.emit_command(PageCommand::fetch_text(
            Locator::new("h1", "class", "?title?"),
            r1,
        ));

        loop {
            if let BusMessage::Result(result) = rx.recv().await.unwrap() {
                assert_eq!(result.request_id, r1);
                assert!(result.success);
                assert_eq!(result.data.as_deref(), Some("Senior Engineer"));
                break;
            }
        }
    }

    struct FailingHost(StaticPage);

    impl PageHost for FailingHost {
        fn document(&self) -> &crate::dom::Document {
            self.0.document()
        }
        fn document_mut(&mut self) -> &mut crate::dom::Document {
            self.0.document_mut()
        }
        fn activate(&mut self, _id: NodeId) -> anyhow::Result<()> {
            anyhow::bail!("element detached")
        }
        fn set_value(&mut self, id: NodeId, value: &str) -> anyhow::Result<()> {
            self.0.set_value(id, value)
        }
    }

    #[test]
    fn test_host_fault_becomes_failed_result() {
        let mut agent = DomAgent::new(FailingHost(StaticPage::from_html(PAGE)));
        let result = agent
            .execute(
                &Locator::new("a", "class", "apply"),
                Action::Click,
                None,
                None,
                Some(RequestId::new()),
            )
            .unwrap();

        assert!(!result.success);
        assert!(result.error.unwrap().contains("element detached"));
    }
}
