//! SPDX license registry embedded at build time.

use std::collections::HashMap;
use std::sync::LazyLock;

const SPDX_LICENSES: &str = include_str!("../../res/spdx-licenses.json");

/// `id -> [full name, OSI approved, deprecated]`, keyed by lowercase id.
static LICENSES: LazyLock<HashMap<String, (String, String, bool)>> = LazyLock::new(|| {
    let raw: HashMap<String, (String, bool, bool)> =
        serde_json::from_str(SPDX_LICENSES).unwrap_or_default();
    raw.into_iter()
        .map(|(id, (name, osi, _deprecated))| (id.to_lowercase(), (id, name, osi)))
        .collect()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct License {
    pub id: String,
    pub full_name: String,
    pub osi_approved: bool,
    pub url: String,
}

impl License {
    /// Looks up an SPDX identifier, ignoring case.
    pub fn lookup(id: &str) -> Option<License> {
        LICENSES
            .get(&id.to_lowercase())
            .map(|(id, full_name, osi_approved)| License {
                id: id.clone(),
                full_name: full_name.clone(),
                osi_approved: *osi_approved,
                url: format!("https://spdx.org/licenses/{}.html#licenseText", id),
            })
    }
}

/// Human readable form of a license identifier; unknown ids are returned as-is.
pub fn describe(id: &str) -> String {
    match License::lookup(id) {
        Some(license) if license.osi_approved => format!(
            "{} ({}) (OSI approved) {}",
            license.full_name, id, license.url
        ),
        Some(license) => format!("{} ({}) {}", license.full_name, id, license.url),
        None => id.to_string(),
    }
}
