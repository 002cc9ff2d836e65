//! Locator resolution: tag + attribute + wildcard pattern + order.
//!
//! Pure lookup, no side effects. Elements lacking the attribute are
//! non-matches, never errors.

use relay::protocol::Locator;

use crate::dom::{Document, NodeId};

/// Match an attribute value against the wildcard pattern grammar.
///
/// `?x?` substring, `x?` prefix, `?x` suffix, bare `x` exact. Matching is
/// case-sensitive on the raw attribute string.
pub fn matches_pattern(pattern: &str, value: &str) -> bool {
    let leading = pattern.starts_with('?');
    let trailing = pattern.ends_with('?');

    if leading && trailing && pattern.len() >= 2 {
        value.contains(&pattern[1..pattern.len() - 1])
    } else if trailing && !leading {
        value.starts_with(&pattern[..pattern.len() - 1])
    } else if leading {
        value.ends_with(&pattern[1..])
    } else {
        value == pattern
    }
}

/// Resolve a locator to the `order`-th matching element in document order,
/// or `None` when no element matches or the index is out of range.
pub fn resolve(doc: &Document, locator: &Locator) -> Option<NodeId> {
    doc.iter()
        .filter(|&id| {
            let node = doc.node(id);
            node.tag == locator.tag
                && node
                    .attr(&locator.attribute)
                    .is_some_and(|value| matches_pattern(&locator.pattern, value))
        })
        .nth(locator.order)
}
