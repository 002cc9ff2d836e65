//! The record assembled per scraped posting.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Applicant summary for one posting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Applicants {
    pub count: u32,
    pub text: String,
}

/// The company attached to a posting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub name: String,
    pub tags: Vec<String>,
}

/// One scraped job posting, built incrementally across a workflow iteration
/// and handed to the store on submission.
///
/// Every field degrades to its empty default when the underlying fetch or
/// parse fails; a draft is always submittable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDraft {
    pub apply_link: String,
    pub posted_ago: String,
    pub tags: Vec<String>,
    pub company: Company,
    pub title: String,
    pub details: BTreeMap<String, String>,
    pub applicants: Applicants,
    pub description: String,
    pub skills: Vec<String>,
}
