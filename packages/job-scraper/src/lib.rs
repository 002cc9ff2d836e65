//! # Job scraper
//!
//! The control-panel half of the scraping pipeline: a looping
//! [`Orchestrator`] that walks one posting per iteration over correlated
//! commands, pure field extractors turning fetched markup into a
//! [`JobDraft`], and submission to a [`JobStore`].
//!
//! ```text
//! ControlPanel ──run flag──▶ Orchestrator ──Execute──▶ (relay) ──▶ page
//!                                 │                                 │
//!                                 ◀──────────Result─────────────────┘
//!                                 │
//!                                 ▼
//!                             JobStore (HTTP)
//! ```

pub mod config;
pub mod draft;
pub mod fields;
pub mod panel;
pub mod submit;
pub mod workflow;

pub use config::{DismissalPlan, FieldLocators, ScrapeConfig};
pub use draft::{Applicants, Company, JobDraft};
pub use panel::ControlPanel;
pub use submit::{HttpJobStore, JobStore};
pub use workflow::{Orchestrator, RunStats, ScrapeState};
