//! Wire types for the page-control protocol.
//!
//! Three command shapes flow from the control panel to the page agent
//! (`Highlight`, `ClearHighlight`, `Execute`) and one reply shape flows
//! back (`ExecuteResult`). Everything is a plain structured message - no
//! binary framing, no versioning field.
//!
//! A command produces a reply only when it carries a [`RequestId`]. Commands
//! without one are fire-and-forget.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque token pairing one command with its one reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Create a new random request ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID value.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one element on the page.
///
/// `tag` and `attribute` select candidate elements, `pattern` filters by
/// attribute value, and `order` picks the n-th (0-indexed) match in
/// document order.
///
/// Pattern grammar: a literal with optional `?` wildcard markers at either
/// end. Both ends present means substring match, trailing-only means prefix
/// match, leading-only means suffix match, no markers means exact match.
/// Matching is case-sensitive on the raw attribute string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub tag: String,
    pub attribute: String,
    pub pattern: String,
    #[serde(default)]
    pub order: usize,
}

impl Locator {
    pub fn new(
        tag: impl Into<String>,
        attribute: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Self {
        Self {
            tag: tag.into(),
            attribute: attribute.into(),
            pattern: pattern.into(),
            order: 0,
        }
    }

    /// Select the n-th match instead of the first.
    pub fn nth(mut self, order: usize) -> Self {
        self.order = order;
        self
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}~{}]#{}",
            self.tag, self.attribute, self.pattern, self.order
        )
    }
}

/// What to do with the element an [`Locator`] resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Click,
    Fill,
    TypeSmoothly,
    Fetch,
}

/// What a fetch action reads from the element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchKind {
    /// The element's rendered text.
    Text,
    /// The element's serialized markup, for child-element inspection.
    Content,
}

/// Commands issued by the control panel for the page agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PageCommand {
    /// Highlight every visible element on the page. The locator anchors the
    /// request; the agent re-scans the whole document regardless.
    Highlight { locator: Locator },

    /// Remove all highlight overlays and restore saved styles.
    ClearHighlight,

    /// Resolve the locator and perform an action against the element.
    Execute {
        locator: Locator,
        action: Action,
        /// Required for `Fill` and `TypeSmoothly`, ignored otherwise.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        /// Required when `action` is `Fetch`.
        #[serde(
            rename = "fetchType",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        fetch: Option<FetchKind>,
        /// Present only when the caller wants a correlated reply.
        #[serde(
            rename = "requestId",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        request_id: Option<RequestId>,
    },
}

impl PageCommand {
    /// A correlated fetch of the element's rendered text.
    pub fn fetch_text(locator: Locator, request_id: RequestId) -> Self {
        Self::Execute {
            locator,
            action: Action::Fetch,
            value: None,
            fetch: Some(FetchKind::Text),
            request_id: Some(request_id),
        }
    }

    /// A correlated fetch of the element's serialized markup.
    pub fn fetch_content(locator: Locator, request_id: RequestId) -> Self {
        Self::Execute {
            locator,
            action: Action::Fetch,
            value: None,
            fetch: Some(FetchKind::Content),
            request_id: Some(request_id),
        }
    }

    /// A click, correlated when `request_id` is provided.
    pub fn click(locator: Locator, request_id: Option<RequestId>) -> Self {
        Self::Execute {
            locator,
            action: Action::Click,
            value: None,
            fetch: None,
            request_id,
        }
    }

    /// The request ID this command carries, if any.
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::Execute { request_id, .. } => *request_id,
            _ => None,
        }
    }
}

/// The one reply shape: emitted exactly once per `Execute` command that
/// carried a request ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResult {
    pub request_id: RequestId,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecuteResult {
    pub fn ok(request_id: RequestId, data: impl Into<String>) -> Self {
        Self {
            request_id,
            success: true,
            data: Some(data.into()),
            error: None,
        }
    }

    pub fn fail(request_id: RequestId, error: impl Into<String>) -> Self {
        Self {
            request_id,
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// The payload, or an empty string when the fetch failed or carried none.
    pub fn data_or_default(&self) -> String {
        self.data.clone().unwrap_or_default()
    }
}
