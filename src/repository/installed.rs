use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::{Listing, PackageSource, SourceKind, answers_to};
use crate::package::Package;
use crate::runtime::Runtime;

/// `installed.json` as written by Composer 1 (a bare list) or Composer 2.
#[derive(Deserialize)]
#[serde(untagged)]
enum InstalledIndex {
    Packages { packages: Vec<serde_json::Value> },
    List(Vec<serde_json::Value>),
}

/// Packages installed in the project's vendor directory.
pub struct InstalledRepository {
    packages: Vec<Package>,
}

impl InstalledRepository {
    pub fn index_path(vendor_dir: &Path) -> PathBuf {
        vendor_dir.join("composer").join("installed.json")
    }

    /// Reads `<vendor_dir>/composer/installed.json`. A missing index means
    /// nothing is installed yet.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime + ?Sized>(runtime: &R, vendor_dir: &Path) -> Result<Self> {
        let path = Self::index_path(vendor_dir);
        if !runtime.exists(&path) {
            debug!("No installed index at {}", path.display());
            return Ok(Self::from_packages(Vec::new()));
        }

        let content = runtime.read_to_string(&path)?;
        let index: InstalledIndex = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        let entries = match index {
            InstalledIndex::Packages { packages } => packages,
            InstalledIndex::List(packages) => packages,
        };

        let mut packages = Vec::with_capacity(entries.len());
        for entry in entries {
            match Package::from_value(entry) {
                Ok(package) => packages.push(package),
                Err(e) => warn!("Skipping unreadable entry in {}: {:#}", path.display(), e),
            }
        }

        debug!("Loaded {} installed packages", packages.len());
        Ok(Self::from_packages(packages))
    }

    pub fn from_packages(packages: Vec<Package>) -> Self {
        Self { packages }
    }
}

#[async_trait]
impl PackageSource for InstalledRepository {
    fn name(&self) -> &str {
        "installed packages"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Installed
    }

    async fn load_packages(&self, name: &str) -> Result<Vec<Package>> {
        Ok(self
            .packages
            .iter()
            .filter(|p| answers_to(p, name))
            .cloned()
            .collect())
    }

    async fn list(&self) -> Result<Listing> {
        Ok(Listing::Packages(self.packages.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;

    fn vendor() -> PathBuf {
        PathBuf::from("/project/vendor")
    }

    fn index() -> PathBuf {
        PathBuf::from("/project/vendor/composer/installed.json")
    }

    #[tokio::test]
    async fn test_load_composer2_index() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().with(eq(index())).returning(|_| true);
        runtime
            .expect_read_to_string()
            .with(eq(index()))
            .returning(|_| {
                Ok(r#"{"packages": [
                    {"name": "alice/widget", "version": "1.0.0", "version_normalized": "1.0.0.0"},
                    {"name": "psr/log", "version": "3.0.0"}
                ], "dev": true}"#
                    .to_string())
            });

        let repo = InstalledRepository::load(&runtime, &vendor()).unwrap();
        let found = repo.load_packages("alice/widget").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].version, "1.0.0.0");
    }

    #[tokio::test]
    async fn test_load_composer1_index() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime.expect_read_to_string().returning(|_| {
            Ok(r#"[{"name": "alice/widget", "version": "dev-master"}]"#.to_string())
        });

        let repo = InstalledRepository::load(&runtime, &vendor()).unwrap();
        match repo.list().await.unwrap() {
            Listing::Packages(packages) => {
                assert_eq!(packages.len(), 1);
                assert!(packages[0].is_dev());
            }
            Listing::Names(_) => panic!("expected packages"),
        }
    }

    #[tokio::test]
    async fn test_missing_index_is_empty() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);

        let repo = InstalledRepository::load(&runtime, &vendor()).unwrap();
        assert!(repo.load_packages("alice/widget").await.unwrap().is_empty());
    }

    #[test]
    fn test_invalid_index_is_an_error() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime
            .expect_read_to_string()
            .returning(|_| Ok("{not json".to_string()));

        let err = InstalledRepository::load(&runtime, &vendor()).err().unwrap();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
