//! Package metadata as published in Composer repositories.
//!
//! A [`Package`] is built from the JSON shape used by `composer.json`,
//! `installed.json` and repository metadata, with the version normalized
//! and the dependency links grouped by [`LinkKind`].

mod constraint;
mod license;
mod link;
mod version;

pub use constraint::{Constraint, Operator};
pub use license::{License, describe as describe_license};
pub use link::{Link, LinkKind};
pub use version::{
    Stability, is_dev, normalize, normalize_branch, stability, version_compare, versions_match,
};

use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;

/// Where a package can be fetched from (`source` or `dist` entry).
#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub reference: Option<String>,
}

/// One autoload path or several.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum PathList {
    One(String),
    Many(Vec<String>),
}

impl fmt::Display for PathList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathList::One(path) if path.is_empty() => f.write_str("."),
            PathList::One(path) => f.write_str(path),
            PathList::Many(paths) => f.write_str(&paths.join(", ")),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Autoload {
    #[serde(rename = "psr-0", default, deserialize_with = "lenient")]
    pub psr_0: BTreeMap<String, PathList>,
    #[serde(rename = "psr-4", default, deserialize_with = "lenient")]
    pub psr_4: BTreeMap<String, PathList>,
    #[serde(default, deserialize_with = "lenient")]
    pub classmap: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub files: Vec<String>,
}

impl Autoload {
    pub fn is_empty(&self) -> bool {
        self.psr_0.is_empty()
            && self.psr_4.is_empty()
            && self.classmap.is_empty()
            && self.files.is_empty()
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
enum Licenses {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
enum Abandoned {
    Flag(bool),
    Replacement(String),
}

/// The JSON shape of a package entry.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case")]
struct RawPackage {
    name: String,
    version: Option<String>,
    #[serde(rename = "version_normalized")]
    version_normalized: Option<String>,
    description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    keywords: Vec<String>,
    #[serde(rename = "type")]
    package_type: Option<String>,
    license: Option<Licenses>,
    time: Option<String>,
    source: Option<Location>,
    dist: Option<Location>,
    #[serde(default, deserialize_with = "lenient")]
    require: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient")]
    require_dev: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient")]
    provide: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient")]
    conflict: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient")]
    replace: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient")]
    suggest: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient")]
    autoload: Autoload,
    #[serde(default, deserialize_with = "lenient")]
    include_path: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    support: BTreeMap<String, String>,
    abandoned: Option<Abandoned>,
}

/// Accepts PHP's empty-array encoding (`[]`) and `null` wherever an object
/// or list is expected.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match &value {
        serde_json::Value::Null => Ok(T::default()),
        serde_json::Value::Array(items) if items.is_empty() => Ok(T::default()),
        _ => serde_json::from_value(value).map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Package {
    /// Lowercase canonical name.
    pub name: String,
    pub pretty_name: String,
    /// Normalized version (`1.2.0.0`, `dev-master`).
    pub version: String,
    pub pretty_version: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub package_type: String,
    pub licenses: Vec<String>,
    /// Release date as published in the metadata.
    pub time: Option<String>,
    pub source: Option<Location>,
    pub dist: Option<Location>,
    pub requires: Vec<Link>,
    pub dev_requires: Vec<Link>,
    pub provides: Vec<Link>,
    pub conflicts: Vec<Link>,
    pub replaces: Vec<Link>,
    pub suggests: BTreeMap<String, String>,
    pub autoload: Autoload,
    pub include_paths: Vec<String>,
    pub support: BTreeMap<String, String>,
    pub abandoned: bool,
    pub replacement_package: Option<String>,
}

impl Package {
    /// Creates a bare package, normalizing `pretty_version`.
    pub fn new(pretty_name: &str, pretty_version: &str) -> Result<Self> {
        let version = normalize(pretty_version)
            .with_context(|| format!("Invalid version {} for {}", pretty_version, pretty_name))?;
        Ok(Package {
            name: pretty_name.to_lowercase(),
            pretty_name: pretty_name.to_string(),
            version,
            pretty_version: pretty_version.to_string(),
            package_type: "library".to_string(),
            ..Default::default()
        })
    }

    /// Builds a package from its JSON metadata.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let raw: RawPackage =
            serde_json::from_value(value).context("Failed to parse package metadata")?;
        Package::from_raw(raw)
    }

    fn from_raw(raw: RawPackage) -> Result<Self> {
        if raw.name.is_empty() {
            bail!("Package metadata has no name");
        }
        let Some(pretty_version) = raw.version else {
            bail!("Package {} has no version", raw.name);
        };

        let version = match raw.version_normalized {
            Some(normalized) => normalized,
            None => normalize(&pretty_version).unwrap_or_else(|_| pretty_version.clone()),
        };

        let name = raw.name.to_lowercase();
        let links = |kind: LinkKind, map: BTreeMap<String, String>| -> Vec<Link> {
            map.into_iter()
                .map(|(target, constraint)| Link {
                    source: name.clone(),
                    target: target.to_lowercase(),
                    kind,
                    pretty_constraint: constraint,
                })
                .collect()
        };

        let (abandoned, replacement_package) = match raw.abandoned {
            None | Some(Abandoned::Flag(false)) => (false, None),
            Some(Abandoned::Flag(true)) => (true, None),
            Some(Abandoned::Replacement(r)) if r.is_empty() => (true, None),
            Some(Abandoned::Replacement(r)) => (true, Some(r)),
        };

        Ok(Package {
            requires: links(LinkKind::Require, raw.require),
            dev_requires: links(LinkKind::RequireDev, raw.require_dev),
            provides: links(LinkKind::Provide, raw.provide),
            conflicts: links(LinkKind::Conflict, raw.conflict),
            replaces: links(LinkKind::Replace, raw.replace),
            pretty_name: raw.name,
            name,
            version,
            pretty_version,
            description: raw.description,
            keywords: raw.keywords,
            package_type: raw.package_type.unwrap_or_else(|| "library".to_string()),
            licenses: match raw.license {
                None => Vec::new(),
                Some(Licenses::One(license)) => vec![license],
                Some(Licenses::Many(licenses)) => licenses,
            },
            time: raw.time,
            source: raw.source,
            dist: raw.dist,
            suggests: raw.suggest,
            autoload: raw.autoload,
            include_paths: raw.include_path,
            support: raw.support,
            abandoned,
            replacement_package,
        })
    }

    /// Links of one kind, in name order.
    pub fn links(&self, kind: LinkKind) -> &[Link] {
        match kind {
            LinkKind::Require => &self.requires,
            LinkKind::RequireDev => &self.dev_requires,
            LinkKind::Provide => &self.provides,
            LinkKind::Conflict => &self.conflicts,
            LinkKind::Replace => &self.replaces,
        }
    }

    pub fn is_dev(&self) -> bool {
        is_dev(&self.version)
    }

    pub fn stability(&self) -> Stability {
        stability(&self.version)
    }

    /// The name plus every name it provides or replaces.
    pub fn names(&self) -> Vec<String> {
        let mut names = vec![self.name.clone()];
        for link in self.provides.iter().chain(&self.replaces) {
            if !names.contains(&link.target) {
                names.push(link.target.clone());
            }
        }
        names
    }

    /// Pretty version, with the source reference appended for dev versions
    /// checked out from git or mercurial. Full 40 character hashes are
    /// shortened to 7.
    pub fn format_version(&self) -> String {
        if !self.is_dev() {
            return self.pretty_version.clone();
        }

        let reference = self
            .source
            .as_ref()
            .filter(|s| matches!(s.kind.as_str(), "git" | "hg"))
            .and_then(|s| s.reference.as_deref())
            .filter(|r| !r.is_empty());

        match reference {
            Some(r) if r.len() == 40 => {
                format!("{} {}", self.pretty_version, r.get(..7).unwrap_or(r))
            }
            Some(r) => format!("{} {}", self.pretty_version, r),
            None => self.pretty_version.clone(),
        }
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source.as_ref().map(|s| s.url.as_str())
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.pretty_name, self.pretty_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value() {
        let package = Package::from_value(json!({
            "name": "Alice/Widget",
            "version": "v1.2.0",
            "description": "Widgets for everyone",
            "keywords": ["widget", "ui"],
            "type": "library",
            "license": "MIT",
            "time": "2024-01-15T10:00:00+00:00",
            "source": {"type": "git", "url": "https://github.com/alice/widget.git", "reference": "abc"},
            "require": {"php": ">=8.1", "psr/log": "^3.0"},
            "require-dev": {"phpunit/phpunit": "^10"},
            "replace": {"alice/old-widget": "self.version"},
            "suggest": {"ext-intl": "For locale support"},
            "autoload": {"psr-4": {"Alice\\Widget\\": "src/"}, "classmap": ["lib/"]},
            "support": {"issues": "https://github.com/alice/widget/issues"}
        }))
        .unwrap();

        assert_eq!(package.name, "alice/widget");
        assert_eq!(package.pretty_name, "Alice/Widget");
        assert_eq!(package.version, "1.2.0.0");
        assert_eq!(package.pretty_version, "v1.2.0");
        assert_eq!(package.licenses, vec!["MIT"]);
        assert_eq!(package.links(LinkKind::Require).len(), 2);
        assert_eq!(package.links(LinkKind::Require)[1].target, "psr/log");
        assert_eq!(package.links(LinkKind::RequireDev)[0].pretty_constraint, "^10");
        assert!(package.links(LinkKind::Provide).is_empty());
        assert_eq!(package.names(), vec!["alice/widget", "alice/old-widget"]);
        assert_eq!(
            package.autoload.psr_4.get("Alice\\Widget\\"),
            Some(&PathList::One("src/".to_string()))
        );
        assert_eq!(package.autoload.classmap, vec!["lib/"]);
        assert!(!package.abandoned);
    }

    #[test]
    fn test_from_value_php_empty_arrays() {
        let package = Package::from_value(json!({
            "name": "alice/widget",
            "version": "1.0.0",
            "require": [],
            "support": [],
            "autoload": [],
            "license": ["MIT", "GPL-2.0-only"]
        }))
        .unwrap();

        assert!(package.requires.is_empty());
        assert!(package.autoload.is_empty());
        assert_eq!(package.licenses.len(), 2);
    }

    #[test]
    fn test_from_value_requires_version() {
        let err = Package::from_value(json!({"name": "alice/widget"})).unwrap_err();
        assert!(err.to_string().contains("has no version"));
    }

    #[test]
    fn test_abandoned() {
        let package = Package::from_value(json!({
            "name": "alice/widget",
            "version": "1.0.0",
            "abandoned": "bob/gadget"
        }))
        .unwrap();
        assert!(package.abandoned);
        assert_eq!(package.replacement_package.as_deref(), Some("bob/gadget"));

        let package = Package::from_value(json!({
            "name": "alice/widget",
            "version": "1.0.0",
            "abandoned": true
        }))
        .unwrap();
        assert!(package.abandoned);
        assert_eq!(package.replacement_package, None);
    }

    #[test]
    fn test_format_version_stable() {
        let package = Package::new("alice/widget", "v1.2.0").unwrap();
        assert_eq!(package.format_version(), "v1.2.0");
    }

    #[test]
    fn test_format_version_dev_with_full_hash() {
        let mut package = Package::new("alice/widget", "dev-master").unwrap();
        package.source = Some(Location {
            kind: "git".to_string(),
            url: "https://github.com/alice/widget.git".to_string(),
            reference: Some("0123456789abcdef0123456789abcdef01234567".to_string()),
        });
        assert_eq!(package.format_version(), "dev-master 0123456");
    }

    #[test]
    fn test_format_version_dev_without_vcs_source() {
        let mut package = Package::new("alice/widget", "dev-master").unwrap();
        assert_eq!(package.format_version(), "dev-master");

        package.source = Some(Location {
            kind: "svn".to_string(),
            url: "https://svn.example.com/widget".to_string(),
            reference: Some("trunk@42".to_string()),
        });
        assert_eq!(package.format_version(), "dev-master");
    }

    #[test]
    fn test_format_version_short_reference_kept() {
        let mut package = Package::new("alice/widget", "1.0.x-dev").unwrap();
        package.source = Some(Location {
            kind: "hg".to_string(),
            url: "https://hg.example.com/widget".to_string(),
            reference: Some("abc123".to_string()),
        });
        assert_eq!(package.format_version(), "1.0.x-dev abc123");
    }

    #[test]
    fn test_path_list_display() {
        assert_eq!(PathList::One(String::new()).to_string(), ".");
        assert_eq!(
            PathList::Many(vec!["src/".to_string(), "lib/".to_string()]).to_string(),
            "src/, lib/"
        );
    }
}
