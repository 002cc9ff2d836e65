//! Scrape configuration: every locator the workflow touches, the polling
//! policy, and the dismissal click sequence.
//!
//! Defaults target a typical job-listing layout; a JSON file overrides them
//! per site. Dismissal reasons are named configuration data rather than
//! positions hard-coded in the workflow.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use relay::protocol::Locator;
use serde::{Deserialize, Serialize};

/// One selectable dismissal reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DismissReason {
    pub name: String,
    pub locator: Locator,
}

/// The click sequence that dismisses the current posting: open the control,
/// pick a reason, confirm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DismissalPlan {
    pub open_control: Locator,
    pub reasons: Vec<DismissReason>,
    /// Which reason the automated loop selects.
    pub default_reason: String,
    pub confirm: Locator,
}

impl DismissalPlan {
    /// The locator for the configured default reason, falling back to the
    /// first reason when the name is unknown.
    pub fn default_reason_locator(&self) -> Option<&Locator> {
        self.reasons
            .iter()
            .find(|r| r.name == self.default_reason)
            .or_else(|| self.reasons.first())
            .map(|r| &r.locator)
    }
}

impl Default for DismissalPlan {
    fn default() -> Self {
        Self {
            open_control: Locator::new("button", "class", "?dismiss-open?"),
            reasons: vec![
                DismissReason {
                    name: "not-interested".into(),
                    locator: Locator::new("li", "class", "?reason-not-interested?"),
                },
                DismissReason {
                    name: "already-applied".into(),
                    locator: Locator::new("li", "class", "?reason-already-applied?"),
                },
            ],
            default_reason: "not-interested".into(),
            confirm: Locator::new("button", "class", "?dismiss-confirm?"),
        }
    }
}

/// Locators for every extracted field of the detail surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldLocators {
    pub apply_link: Locator,
    pub applicant_tags: Locator,
    pub company_line: Locator,
    pub title: Locator,
    pub details_row: Locator,
    pub summary: Locator,
    pub company_tags: Locator,
    pub responsibilities: Locator,
    pub qualifications: Locator,
    pub benefits: Locator,
    pub skills: Locator,
}

impl Default for FieldLocators {
    fn default() -> Self {
        Self {
            apply_link: Locator::new("div", "class", "?apply-box?"),
            applicant_tags: Locator::new("div", "class", "?applicant-info?"),
            company_line: Locator::new("div", "class", "?company-row?"),
            title: Locator::new("h1", "class", "?top-title?"),
            details_row: Locator::new("ul", "class", "?details-row?"),
            summary: Locator::new("p", "class", "?summary?"),
            company_tags: Locator::new("ul", "class", "?company-tags?"),
            responsibilities: Locator::new("div", "class", "?sec-responsibilities?"),
            qualifications: Locator::new("div", "class", "?sec-qualifications?"),
            benefits: Locator::new("div", "class", "?sec-benefits?"),
            skills: Locator::new("div", "class", "?skills-block?"),
        }
    }
}

/// Full workflow configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// The list item the iteration opens.
    pub list_item: Locator,
    /// Element present only on the detail surface.
    pub detail_marker: Locator,
    /// Element present only on the list surface.
    pub list_marker: Locator,
    pub fields: FieldLocators,
    pub dismissal: DismissalPlan,
    /// Attempts per marker poll before the iteration gives up.
    pub poll_attempts: u32,
    pub poll_delay_ms: u64,
    /// Per-command reply window.
    pub command_timeout_ms: u64,
    /// Delay between dismissal clicks, giving the page time to react.
    pub dismiss_delay_ms: u64,
    /// Where completed drafts are submitted.
    pub submit_url: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            list_item: Locator::new("li", "class", "?job-card?"),
            detail_marker: Locator::new("div", "class", "?job-detail?"),
            list_marker: Locator::new("ul", "class", "?jobs-list?"),
            fields: FieldLocators::default(),
            dismissal: DismissalPlan::default(),
            poll_attempts: 10,
            poll_delay_ms: 500,
            command_timeout_ms: 5_000,
            dismiss_delay_ms: 250,
            submit_url: "http://localhost:8080/jobs".into(),
        }
    }
}

impl ScrapeConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("invalid scrape config")
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading scrape config from {}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn with_submit_url(mut self, url: impl Into<String>) -> Self {
        self.submit_url = url.into();
        self
    }

    pub fn poll_delay(&self) -> Duration {
        Duration::from_millis(self.poll_delay_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn dismiss_delay(&self) -> Duration {
        Duration::from_millis(self.dismiss_delay_ms)
    }
}
