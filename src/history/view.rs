use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::github::Release;

const DATE_FORMAT: &str = "%d/%m/%y";

/// One version in a history view.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseEntry {
    pub name: String,
    pub description: Option<String>,
    pub release_date: Option<String>,
}

impl ReleaseEntry {
    pub fn from_release(release: &Release) -> Self {
        Self {
            name: release.tag_name.clone(),
            description: release.body.clone(),
            release_date: release.published_at.as_deref().and_then(format_date),
        }
    }
}

/// What changed between the installed version of a package and its latest release.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct HistoryView {
    pub bundle: String,
    pub installed: ReleaseEntry,
    pub latest: Option<ReleaseEntry>,
    pub included: Vec<ReleaseEntry>,
}

/// Formats a timestamp as `dd/mm/yy`. Accepts RFC 3339 and the
/// `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DD` forms found in older metadata.
pub fn format_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let date = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()?;
    Some(date.format(DATE_FORMAT).to_string())
}
