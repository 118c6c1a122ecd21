use log::{debug, warn};

use super::{Matcher, PackageId, policy};
use crate::package::{Constraint, Link, Package};
use crate::repository::RepositorySet;

/// Candidate packages for one name, tagged with the index of the source
/// they came from.
#[derive(Debug, Default)]
pub struct Pool {
    entries: Vec<(usize, Package)>,
}

impl Pool {
    pub fn new(entries: Vec<(usize, Package)>) -> Self {
        Self { entries }
    }

    /// Loads every candidate for `name` from the sources of `set`. A source
    /// that fails to load is skipped with a warning.
    #[tracing::instrument(skip(set))]
    pub async fn load(set: &RepositorySet, name: &str) -> Self {
        let mut entries = Vec::new();

        for (index, source) in set.sources().iter().enumerate() {
            match source.load_packages(name).await {
                Ok(packages) => {
                    debug!("{} returned {} candidates for {}", source.name(), packages.len(), name);
                    entries.extend(packages.into_iter().map(|p| (index, p)));
                }
                Err(e) => warn!("Skipping {}: {:#}", source.name(), e),
            }
        }

        Self::new(entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether a provide/replace link can satisfy `constraint`. Links pinned to
/// one version are checked exactly; ranges are accepted.
fn link_satisfies(package: &Package, link: &Link, constraint: &Constraint) -> bool {
    let pretty = if link.pretty_constraint == "self.version" {
        package.pretty_version.as_str()
    } else {
        link.pretty_constraint.as_str()
    };

    match Constraint::parse(pretty) {
        Ok(provided) => match provided.exact_version() {
            Some(version) => constraint.matches(version),
            None => true,
        },
        Err(e) => {
            debug!("Ignoring {} of {}: {:#}", link, package.name, e);
            false
        }
    }
}

impl Matcher for Pool {
    fn what_provides(&self, name: &str, constraint: Option<&Constraint>) -> Vec<PackageId> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, (_, package))| {
                if package.name == name {
                    return constraint.is_none_or(|c| c.matches(&package.version));
                }
                package
                    .provides
                    .iter()
                    .chain(&package.replaces)
                    .filter(|link| link.target == name)
                    .any(|link| constraint.is_none_or(|c| link_satisfies(package, link, c)))
            })
            .map(|(id, _)| id)
            .collect()
    }

    fn package(&self, id: PackageId) -> Option<&Package> {
        self.entries.get(id).map(|(_, package)| package)
    }

    fn source_of(&self, id: PackageId) -> Option<usize> {
        self.entries.get(id).map(|(source, _)| *source)
    }

    fn select_preferred(&self, candidates: &[PackageId]) -> Vec<PackageId> {
        policy::select_preferred(self, candidates)
    }
}
