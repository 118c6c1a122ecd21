use anyhow::Result;
use async_trait::async_trait;

use super::{Listing, PackageSource, SourceKind, answers_to};
use crate::package::Package;

/// An in-memory list of packages, used for inline `package` repositories.
pub struct ArrayRepository {
    name: String,
    kind: SourceKind,
    packages: Vec<Package>,
}

impl ArrayRepository {
    pub fn new(name: impl Into<String>, kind: SourceKind, packages: Vec<Package>) -> Self {
        Self {
            name: name.into(),
            kind,
            packages,
        }
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }
}

#[async_trait]
impl PackageSource for ArrayRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
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
