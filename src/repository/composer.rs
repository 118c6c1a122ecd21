//! Remote Composer repositories (`packages.json` protocol).

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::OnceCell;

use super::{Listing, PackageSource, SourceKind, answers_to};
use crate::http::{HttpClient, is_not_found};
use crate::package::Package;

pub const DEFAULT_PACKAGIST_URL: &str = "https://repo.packagist.org";

/// Marker for keys removed relative to the previous entry in minified metadata.
const UNSET: &str = "__unset";

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case")]
struct RootMetadata {
    #[serde(default)]
    packages: Value,
    metadata_url: Option<String>,
    list: Option<String>,
}

#[derive(Deserialize, Debug)]
struct PackageMetadata {
    #[serde(default)]
    packages: Map<String, Value>,
    #[serde(default)]
    minified: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PackageNames {
    package_names: Vec<String>,
}

/// Root metadata after resolving URLs against the repository base.
#[derive(Debug)]
struct Root {
    /// Packages embedded in `packages.json`, if any.
    inline: Option<Vec<Package>>,
    metadata_url: Option<String>,
    list_url: Url,
}

pub struct ComposerRepository {
    name: String,
    base_url: Url,
    http_client: HttpClient,
    root: OnceCell<Root>,
}

impl ComposerRepository {
    pub fn new(name: impl Into<String>, url: &str, http_client: HttpClient) -> Result<Self> {
        let mut base = url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url =
            Url::parse(&base).with_context(|| format!("Invalid repository url {}", url))?;

        Ok(Self {
            name: name.into(),
            base_url,
            http_client,
            root: OnceCell::new(),
        })
    }

    /// The public packagist.org repository.
    pub fn packagist(url: Option<&str>, http_client: HttpClient) -> Result<Self> {
        Self::new("packagist.org", url.unwrap_or(DEFAULT_PACKAGIST_URL), http_client)
    }

    fn resolve(&self, url: &str) -> Result<Url> {
        self.base_url
            .join(url)
            .with_context(|| format!("Invalid url {} in repository {}", url, self.name))
    }

    async fn root(&self) -> Result<&Root> {
        self.root.get_or_try_init(|| self.fetch_root()).await
    }

    #[tracing::instrument(skip(self), fields(repository = %self.name))]
    async fn fetch_root(&self) -> Result<Root> {
        let url = self.resolve("packages.json")?;
        debug!("Fetching repository root from {}...", url);

        let metadata: RootMetadata = self
            .http_client
            .get_json(url.as_str())
            .await
            .with_context(|| format!("Failed to load {}", self.name))?;

        let inline = inline_packages(metadata.packages);
        let list_url = self.resolve(metadata.list.as_deref().unwrap_or("packages/list.json"))?;

        Ok(Root {
            inline,
            metadata_url: metadata.metadata_url,
            list_url,
        })
    }

    /// Fetches `metadata_url` for `name`; a repository that does not know
    /// the package answers 404, which counts as no versions.
    async fn fetch_versions(&self, metadata_url: &str, name: &str) -> Result<Vec<Package>> {
        let url = self.resolve(&metadata_url.replace("%package%", name))?;
        debug!("Fetching package metadata from {}...", url);

        let metadata: PackageMetadata = match self.http_client.get_json(url.as_str()).await {
            Ok(metadata) => metadata,
            Err(e) if is_not_found(&e) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut packages = Vec::new();
        for (_, versions) in metadata.packages {
            let Value::Array(versions) = versions else {
                continue;
            };
            let versions = if metadata.minified.is_some() {
                expand_minified(versions)
            } else {
                versions
            };
            packages.extend(parse_packages(versions));
        }
        Ok(packages)
    }
}

/// Reverses Composer 2 metadata minification: each entry only carries the
/// keys that changed since the previous one.
fn expand_minified(versions: Vec<Value>) -> Vec<Value> {
    let mut expanded = Vec::with_capacity(versions.len());
    let mut previous = Map::new();

    for entry in versions {
        let Value::Object(entry) = entry else {
            continue;
        };
        for (key, value) in entry {
            if value.as_str() == Some(UNSET) {
                previous.remove(&key);
            } else {
                previous.insert(key, value);
            }
        }
        expanded.push(Value::Object(previous.clone()));
    }

    expanded
}

fn parse_packages(entries: Vec<Value>) -> Vec<Package> {
    entries
        .into_iter()
        .filter_map(|entry| match Package::from_value(entry) {
            Ok(package) => Some(package),
            Err(e) => {
                debug!("Skipping unreadable package entry: {:#}", e);
                None
            }
        })
        .collect()
}

/// `packages` in `packages.json` is either `{name: {version: package}}` or
/// a plain list; PHP encodes an empty map as `[]`.
fn inline_packages(packages: Value) -> Option<Vec<Package>> {
    match packages {
        Value::Object(by_name) if !by_name.is_empty() => {
            let entries = by_name
                .into_iter()
                .flat_map(|(_, versions)| match versions {
                    Value::Object(by_version) => by_version.into_iter().map(|(_, p)| p).collect(),
                    Value::Array(list) => list,
                    _ => Vec::new(),
                })
                .collect();
            Some(parse_packages(entries))
        }
        Value::Array(list) if !list.is_empty() => Some(parse_packages(list)),
        _ => None,
    }
}

#[async_trait]
impl PackageSource for ComposerRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Available
    }

    #[tracing::instrument(skip(self), fields(repository = %self.name))]
    async fn load_packages(&self, name: &str) -> Result<Vec<Package>> {
        let root = self.root().await?;

        if let Some(inline) = &root.inline {
            return Ok(inline
                .iter()
                .filter(|p| answers_to(p, name))
                .cloned()
                .collect());
        }

        let Some(metadata_url) = &root.metadata_url else {
            warn!("Repository {} exposes no package metadata", self.name);
            return Ok(Vec::new());
        };

        let mut packages = self.fetch_versions(metadata_url, name).await?;
        let dev_name = format!("{}~dev", name);
        packages.extend(self.fetch_versions(metadata_url, &dev_name).await?);

        debug!("{} has {} versions of {}", self.name, packages.len(), name);
        Ok(packages)
    }

    #[tracing::instrument(skip(self), fields(repository = %self.name))]
    async fn list(&self) -> Result<Listing> {
        let root = self.root().await?;

        if let Some(inline) = &root.inline {
            return Ok(Listing::Packages(inline.clone()));
        }

        debug!("Fetching package names from {}...", root.list_url);
        let names: PackageNames = self
            .http_client
            .get_json(root.list_url.as_str())
            .await
            .with_context(|| format!("Failed to list packages of {}", self.name))?;

        Ok(Listing::Names(names.package_names))
    }
}
