//! The Composer project in the working directory.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

const DEFAULT_MANIFEST: &str = "composer.json";
const DEFAULT_VENDOR_DIR: &str = "vendor";

/// Names under which the default packagist repository can be disabled.
const PACKAGIST_NAMES: [&str; 2] = ["packagist", "packagist.org"];

/// A repository declared in `composer.json`.
#[derive(Debug, Clone, PartialEq)]
pub enum RepositoryConfig {
    Composer { url: String },
    /// Inline package definitions.
    Package { packages: Vec<Value> },
    Unsupported { kind: String },
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case")]
pub struct ProjectConfig {
    pub vendor_dir: Option<String>,
    #[serde(default)]
    pub platform: BTreeMap<String, Value>,
    #[serde(default)]
    pub github_oauth: BTreeMap<String, String>,
}

#[derive(Deserialize, Debug, Default)]
struct Manifest {
    #[serde(default)]
    repositories: Value,
    #[serde(default)]
    config: ProjectConfig,
}

#[derive(Debug)]
pub struct Project {
    pub dir: PathBuf,
    pub config: ProjectConfig,
    pub repositories: Vec<RepositoryConfig>,
    /// False when the manifest disables packagist.org.
    pub packagist_enabled: bool,
}

impl Project {
    /// Loads the manifest from `dir`. The file name comes from `COMPOSER`
    /// and defaults to `composer.json`; a missing file means there is no project.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime + ?Sized>(runtime: &R, dir: &Path) -> Result<Option<Self>> {
        let manifest_name = runtime
            .env_var("COMPOSER")
            .ok()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_MANIFEST.to_string());
        let path = dir.join(manifest_name);

        if !runtime.exists(&path) {
            debug!("No manifest at {}", path.display());
            return Ok(None);
        }

        let content = runtime.read_to_string(&path)?;
        Self::parse(dir, &content)
            .with_context(|| format!("Failed to parse {}", path.display()))
            .map(Some)
    }

    fn parse(dir: &Path, content: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(content)?;
        let (repositories, packagist_enabled) = parse_repositories(manifest.repositories);

        Ok(Project {
            dir: dir.to_path_buf(),
            config: manifest.config,
            repositories,
            packagist_enabled,
        })
    }

    pub fn vendor_dir(&self) -> PathBuf {
        self.dir.join(
            self.config
                .vendor_dir
                .as_deref()
                .unwrap_or(DEFAULT_VENDOR_DIR),
        )
    }

    /// `config.platform` as `name -> version`; `false` entries map to `None`.
    pub fn platform_overrides(&self) -> BTreeMap<String, Option<String>> {
        let mut overrides = BTreeMap::new();
        for (name, value) in &self.config.platform {
            match value {
                Value::String(version) => {
                    overrides.insert(name.clone(), Some(version.clone()));
                }
                Value::Bool(false) => {
                    overrides.insert(name.clone(), None);
                }
                other => warn!("Ignoring platform override {}: {}", name, other),
            }
        }
        overrides
    }

    /// `config.github-oauth."github.com"`.
    pub fn github_token(&self) -> Option<&str> {
        self.config.github_oauth.get("github.com").map(String::as_str)
    }
}

/// `repositories` is either a list or a map keyed by repository name.
fn parse_repositories(value: Value) -> (Vec<RepositoryConfig>, bool) {
    let entries: Vec<(Option<String>, Value)> = match value {
        Value::Array(list) => list.into_iter().map(|v| (None, v)).collect(),
        Value::Object(map) => map.into_iter().map(|(k, v)| (Some(k), v)).collect(),
        _ => Vec::new(),
    };

    let mut repositories = Vec::new();
    let mut packagist_enabled = true;

    for (key, definition) in entries {
        match definition {
            Value::Bool(false) if key.as_deref().is_some_and(is_packagist) => {
                packagist_enabled = false;
            }
            Value::Object(map) if map.len() == 1 && !map.contains_key("type") => {
                // `{"packagist.org": false}` inside the list form
                if let Some((name, Value::Bool(false))) = map.iter().next() {
                    if is_packagist(name) {
                        packagist_enabled = false;
                        continue;
                    }
                }
                warn!("Ignoring repository definition without a type");
            }
            Value::Object(map) => repositories.push(repository_config(&map)),
            other => warn!("Ignoring repository definition {}", other),
        }
    }

    (repositories, packagist_enabled)
}

fn is_packagist(name: &str) -> bool {
    PACKAGIST_NAMES.contains(&name)
}

fn repository_config(map: &serde_json::Map<String, Value>) -> RepositoryConfig {
    let kind = map.get("type").and_then(Value::as_str).unwrap_or_default();
    match kind {
        "composer" => match map.get("url").and_then(Value::as_str) {
            Some(url) => RepositoryConfig::Composer {
                url: url.to_string(),
            },
            None => RepositoryConfig::Unsupported {
                kind: "composer without url".to_string(),
            },
        },
        "package" => {
            let packages = match map.get("package") {
                Some(Value::Array(list)) => list.clone(),
                Some(single @ Value::Object(_)) => vec![single.clone()],
                _ => Vec::new(),
            };
            RepositoryConfig::Package { packages }
        }
        other => RepositoryConfig::Unsupported {
            kind: other.to_string(),
        },
    }
}
