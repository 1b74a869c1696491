//! Record filters applied after a (keyword, quarter) collection.

use crate::models::NewsRecord;
use crate::quarters::QuarterRange;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?b>").expect("static regex"));

/// Remove the `<b>`/`</b>` tags the search API wraps around matched terms.
pub fn strip_emphasis(text: &str) -> String {
    EMPHASIS.replace_all(text, "").into_owned()
}

/// Keep records whose publish date falls inside the quarter window.
///
/// The date is taken in the timestamp's own offset, and the end date counts
/// through the end of that day.
pub fn retain_within(records: Vec<NewsRecord>, quarter: &QuarterRange) -> Vec<NewsRecord> {
    let before = records.len();
    let kept: Vec<NewsRecord> = records
        .into_iter()
        .filter(|r| quarter.contains(r.published_at.date_naive()))
        .collect();
    debug!(quarter = %quarter.label, before, after = kept.len(), "Applied date window");
    kept
}

/// Exact-phrase gate downstream of the search API.
///
/// The API matches loosely (individual tokens), so a record is kept only if
/// its title or description contains the phrase as a literal, case-sensitive
/// substring. A disabled filter passes everything through.
#[derive(Debug, Clone, Copy)]
pub struct PhraseFilter {
    enabled: bool,
}

impl PhraseFilter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn apply(&self, records: Vec<NewsRecord>, phrase: &str) -> Vec<NewsRecord> {
        if !self.enabled {
            return records;
        }
        records
            .into_iter()
            .filter(|r| r.title.contains(phrase) || r.description.contains(phrase))
            .collect()
    }
}
