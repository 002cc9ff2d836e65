//! Owned, mutable document model.
//!
//! The agent must save and restore inline styles and serialize subtrees, so
//! it keeps its own arena instead of holding `scraper::Html` (which is
//! read-only and not `Send`). The `scraper` crate is used once, at parse
//! time; afterwards the arena owns everything.
//!
//! Nodes are stored in preorder, so iterating indices *is* document order.

use std::sync::atomic::{AtomicU64, Ordering};

use scraper::{ElementRef, Html};
use serde::Serialize;

static NEXT_STAMP: AtomicU64 = AtomicU64::new(0);

fn next_stamp() -> u64 {
    NEXT_STAMP.fetch_add(1, Ordering::Relaxed)
}

/// Index of one element in a [`Document`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One element: tag, attributes in source order, own text, children.
#[derive(Debug, Clone)]
pub struct Node {
    pub tag: String,
    attrs: Vec<(String, String)>,
    /// Concatenated direct text children, whitespace-trimmed.
    pub text: String,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl Node {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(k, _)| k != name);
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

/// Tagged tree for diagnostic capture: tag, attributes, own text if leaf,
/// children.
#[derive(Debug, Clone, Serialize)]
pub struct DomTree {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub children: Vec<DomTree>,
}

/// Flat preorder arena holding one parsed page.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    /// Identity of this parse. Every parse gets a fresh stamp; clones share
    /// theirs. Holders of [`NodeId`]s compare stamps to detect that the
    /// document they indexed into has been replaced.
    stamp: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            stamp: next_stamp(),
        }
    }
}

/// Tags that never render and are skipped by text/visibility logic.
const NON_RENDERED: &[&str] = &[
    "script", "style", "noscript", "template", "head", "meta", "link", "title", "base",
];

/// Void elements, serialized without a closing tag.
const VOID: &[&str] = &[
    "area", "br", "col", "embed", "hr", "img", "input", "source", "track", "wbr",
];

impl Document {
    /// Parse a full HTML document. The parser synthesizes `html`/`body`
    /// wrappers when the input lacks them.
    pub fn parse(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        Self::from_root(parsed.root_element())
    }

    /// Parse an HTML fragment (a snippet without document structure).
    pub fn parse_fragment(html: &str) -> Self {
        let parsed = Html::parse_fragment(html);
        Self::from_root(parsed.root_element())
    }

    fn from_root(root: ElementRef<'_>) -> Self {
        let mut doc = Self::default();
        doc.build(None, root);
        doc
    }

    fn build(&mut self, parent: Option<NodeId>, el: ElementRef<'_>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            tag: el.value().name().to_string(),
            attrs: el
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            text: String::new(),
            children: Vec::new(),
            parent,
        });

        for child in el.children() {
            match child.value() {
                scraper::Node::Element(_) => {
                    if let Some(child_ref) = ElementRef::wrap(child) {
                        let child_id = self.build(Some(id), child_ref);
                        self.nodes[id.0].children.push(child_id);
                    }
                }
                scraper::Node::Text(t) => {
                    let trimmed = t.trim();
                    if !trimmed.is_empty() {
                        let own = &mut self.nodes[id.0].text;
                        if !own.is_empty() {
                            own.push(' ');
                        }
                        own.push_str(trimmed);
                    }
                }
                _ => {}
            }
        }

        id
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// This parse's identity stamp.
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// All elements in document order.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// First element with the given tag, in document order.
    pub fn find_tag(&self, tag: &str) -> Option<NodeId> {
        self.iter().find(|id| self.node(*id).tag == tag)
    }

    /// Rendered-text approximation: trimmed text chunks of the subtree in
    /// document order, one line per chunk.
    pub fn inner_text(&self, id: NodeId) -> String {
        let mut lines = Vec::new();
        self.collect_text(id, &mut lines);
        lines.join("\n")
    }

    fn collect_text(&self, id: NodeId, lines: &mut Vec<String>) {
        let node = self.node(id);
        if NON_RENDERED.contains(&node.tag.as_str()) {
            return;
        }
        if !node.text.is_empty() {
            lines.push(node.text.clone());
        }
        for &child in &node.children {
            self.collect_text(child, lines);
        }
    }

    /// Serialized markup of the subtree rooted at `id`.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let node = self.node(id);
        out.push('<');
        out.push_str(&node.tag);
        for (k, v) in node.attrs() {
            out.push(' ');
            out.push_str(k);
            out.push_str("=\"");
            out.push_str(&escape_attr(v));
            out.push('"');
        }
        out.push('>');

        if VOID.contains(&node.tag.as_str()) {
            return;
        }

        if !node.text.is_empty() {
            out.push_str(&escape_text(&node.text));
        }
        for &child in &node.children {
            self.write_html(child, out);
        }
        out.push_str("</");
        out.push_str(&node.tag);
        out.push('>');
    }

    /// Diagnostic tree of the subtree rooted at `id`.
    pub fn tree(&self, id: NodeId) -> DomTree {
        let node = self.node(id);
        DomTree {
            tag: node.tag.clone(),
            attrs: node.attrs.clone(),
            text: if node.children.is_empty() && !node.text.is_empty() {
                Some(node.text.clone())
            } else {
                None
            },
            children: node
                .children
                .iter()
                .map(|&child| self.tree(child))
                .collect(),
        }
    }

    /// Whether the element renders at all: a non-rendered tag, a `hidden`
    /// attribute, or an inline `display: none` makes it invisible.
    pub fn is_visible(&self, id: NodeId) -> bool {
        let node = self.node(id);
        if NON_RENDERED.contains(&node.tag.as_str()) {
            return false;
        }
        if node.attr("hidden").is_some() {
            return false;
        }
        if let Some(style) = node.attr("style") {
            let collapsed: String = style.chars().filter(|c| !c.is_whitespace()).collect();
            if collapsed.contains("display:none") {
                return false;
            }
        }
        true
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preorder_is_document_order() {
        let doc = Document::parse(
            "<html><body><div id=\"a\"><span id=\"b\"></span></div><p id=\"c\"></p></body></html>",
        );
        let order: Vec<String> = doc
            .iter()
            .filter_map(|id| doc.node(id).attr("id").map(String::from))
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_each_parse_gets_its_own_stamp() {
        let a = Document::parse("<body><p>a</p></body>");
        let b = Document::parse("<body><p>a</p></body>");
        assert_ne!(a.stamp(), b.stamp());
        // A clone is the same document.
        assert_eq!(a.stamp(), a.clone().stamp());
    }

    #[test]
    fn test_inner_text_joins_chunks_with_newlines() {
        let doc = Document::parse("<ul><li>Rust</li><li>Tokio</li><li>Serde</li></ul>");
        let ul = doc.find_tag("ul").unwrap();
        assert_eq!(doc.inner_text(ul), "Rust\nTokio\nSerde");
    }

    #[test]
    fn test_inner_text_skips_script_and_style() {
        let doc = Document::parse("<div>visible<script>var x = 1;</script></div>");
        let div = doc.find_tag("div").unwrap();
        assert_eq!(doc.inner_text(div), "visible");
    }

    #[test]
    fn test_outer_html_round_trips_through_parser() {
        let doc = Document::parse("<div class=\"card\"><a href=\"/jobs/1\">Apply</a></div>");
        let div = doc.find_tag("div").unwrap();
        let markup = doc.outer_html(div);

        let reparsed = Document::parse_fragment(&markup);
        let a = reparsed.find_tag("a").unwrap();
        assert_eq!(reparsed.node(a).attr("href"), Some("/jobs/1"));
        assert_eq!(reparsed.node(a).text, "Apply");
    }

    #[test]
    fn test_outer_html_escapes_entities() {
        let doc = Document::parse("<p title=\"a&quot;b\">5 &lt; 6</p>");
        let p = doc.find_tag("p").unwrap();
        let markup = doc.outer_html(p);
        assert!(markup.contains("5 &lt; 6"));
        assert!(markup.contains("a&quot;b"));
    }

    #[test]
    fn test_set_attr_overwrites_and_inserts() {
        let mut doc = Document::parse("<div class=\"x\"></div>");
        let div = doc.find_tag("div").unwrap();

        doc.node_mut(div).set_attr("class", "y");
        assert_eq!(doc.node(div).attr("class"), Some("y"));

        doc.node_mut(div).set_attr("style", "outline: none");
        assert_eq!(doc.node(div).attr("style"), Some("outline: none"));
    }

    #[test]
    fn test_visibility() {
        let doc = Document::parse(
            "<body><div id=\"shown\"></div>\
             <div id=\"hidden\" hidden></div>\
             <div id=\"none\" style=\"display: none\"></div>\
             <script id=\"js\"></script></body>",
        );
        let by_id = |id: &str| {
            doc.iter()
                .find(|n| doc.node(*n).attr("id") == Some(id))
                .unwrap()
        };
        assert!(doc.is_visible(by_id("shown")));
        assert!(!doc.is_visible(by_id("hidden")));
        assert!(!doc.is_visible(by_id("none")));
        assert!(!doc.is_visible(by_id("js")));
    }

    #[test]
    fn test_tree_marks_leaf_text() {
        let doc = Document::parse("<div><span>leaf</span><p><b>deep</b></p></div>");
        let div = doc.find_tag("div").unwrap();
        let tree = doc.tree(div);

        assert_eq!(tree.tag, "div");
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].text.as_deref(), Some("leaf"));
        // Non-leaf carries no own text in the capture.
        assert!(tree.children[1].text.is_none());
    }
}
