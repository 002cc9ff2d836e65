//! Pure field extractors: serialized markup or rendered text in, one typed
//! value out.
//!
//! Each function is total - malformed or empty input yields the field's
//! empty default, never an error. The orchestrator feeds these the payloads
//! of its correlated fetches; nothing here touches the bus.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};

use crate::draft::Applicants;

/// Token separating the company name from the posted-time fragment.
const COMPANY_SEPARATOR: char = '\u{b7}'; // '·'

/// First anchor `href` in the snippet, or empty.
pub fn apply_link(markup: &str) -> String {
    let doc = Html::parse_fragment(markup);
    let Ok(anchors) = Selector::parse("a") else {
        return String::new();
    };
    doc.select(&anchors)
        .find_map(|a| a.value().attr("href"))
        .map(String::from)
        .unwrap_or_default()
}

/// Non-empty trimmed lines of a rendered-text payload.
pub fn lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// `(company name, posted-time)` from the company row snippet.
///
/// The row renders as two text chunks with a `·` separator between or
/// inside them; both sides come back with the separator stripped.
pub fn company_line(markup: &str) -> (String, String) {
    let doc = Html::parse_fragment(markup);
    let mut chunks = doc
        .root_element()
        .text()
        .map(strip_separator)
        .filter(|chunk| !chunk.is_empty());

    let name = chunks.next().unwrap_or_default();
    let posted = chunks.next().unwrap_or_default();
    (name, posted)
}

fn strip_separator(chunk: &str) -> String {
    chunk
        .trim_matches(|c: char| c == COMPANY_SEPARATOR || c.is_whitespace())
        .to_string()
}

/// Key -> value map from a metadata row.
///
/// Each entry is keyed by an icon's accessible label; the value is the
/// rendered text of the element containing that icon.
pub fn detail_map(markup: &str) -> BTreeMap<String, String> {
    let mut details = BTreeMap::new();
    let doc = Html::parse_fragment(markup);
    let Ok(labeled) = Selector::parse("[aria-label]") else {
        return details;
    };

    for icon in doc.select(&labeled) {
        let Some(label) = icon.value().attr("aria-label") else {
            continue;
        };
        let value = icon
            .parent()
            .and_then(ElementRef::wrap)
            .map(element_text)
            .unwrap_or_default();
        details.insert(label.to_string(), value);
    }
    details
}

/// Items of the first list in the snippet, one string per `<li>`.
pub fn tag_list(markup: &str) -> Vec<String> {
    let doc = Html::parse_fragment(markup);
    let Ok(items) = Selector::parse("li") else {
        return Vec::new();
    };
    doc.select(&items)
        .map(element_text)
        .filter(|item| !item.is_empty())
        .collect()
}

/// Applicant count and line from the applicant/tag text block.
///
/// The block is newline-separated; the applicant line is the first one
/// mentioning applicants, and the count is its first run of digits. No
/// such line degrades to a zero count and empty text.
pub fn applicants(text: &str) -> Applicants {
    let Some(line) = lines(text)
        .into_iter()
        .find(|line| line.to_lowercase().contains("applicant"))
    else {
        return Applicants::default();
    };
    Applicants {
        count: first_number(&line),
        text: line,
    }
}

/// The first contiguous run of ASCII digits, or zero.
pub fn first_number(text: &str) -> u32 {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

/// Join description sections with blank-line separators, skipping empties.
pub fn join_sections(sections: &[&str]) -> String {
    sections
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
