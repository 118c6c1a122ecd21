//! Picks the package a name (and optional constraint) refers to.
//!
//! This is not a dependency solver: it gathers every candidate for one
//! name into a [`Pool`] and ranks them, preferring an installed package
//! when no version was asked for.

mod policy;
mod pool;

use anyhow::{Result, bail};
use log::debug;
use std::collections::BTreeMap;

use crate::package::{Constraint, Package, version_compare};
use crate::repository::RepositorySet;

pub use pool::Pool;

/// Index of a package inside a [`Matcher`].
pub type PackageId = usize;

/// Candidate lookup and ranking.
pub trait Matcher {
    /// Packages named `name` that satisfy `constraint`, plus packages
    /// providing or replacing `name`.
    fn what_provides(&self, name: &str, constraint: Option<&Constraint>) -> Vec<PackageId>;

    fn package(&self, id: PackageId) -> Option<&Package>;

    /// Index of the source a package was loaded from.
    fn source_of(&self, id: PackageId) -> Option<usize>;

    /// Candidates ordered best first.
    fn select_preferred(&self, candidates: &[PackageId]) -> Vec<PackageId>;
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolutionResult {
    pub package: Option<Package>,
    /// Whether the chosen package came from the installed view.
    pub installed: bool,
    /// Every matching version: pretty -> normalized.
    pub versions: BTreeMap<String, String>,
}

impl ResolutionResult {
    /// The chosen package, or the error to report when there is none.
    pub fn found(&self, name: &str) -> Result<&Package> {
        match &self.package {
            Some(package) => Ok(package),
            None if self.versions.is_empty() => bail!("Package {} not found", name),
            None => bail!(
                "Found {} versions of {} but could not select one",
                self.versions.len(),
                name
            ),
        }
    }

    /// Pretty versions, newest first.
    pub fn sorted_versions(&self) -> Vec<&str> {
        let mut versions: Vec<(&String, &String)> = self.versions.iter().collect();
        versions.sort_by(|(_, a), (_, b)| version_compare(b, a));
        versions.into_iter().map(|(pretty, _)| pretty.as_str()).collect()
    }
}

/// Resolves `name` against every source of `set`. An unparseable
/// `version` constraint is an error.
#[tracing::instrument(skip(set))]
pub async fn resolve(set: &RepositorySet, name: &str, version: Option<&str>) -> Result<ResolutionResult> {
    let name = name.to_lowercase();
    let constraint = version.map(Constraint::parse).transpose()?;

    let pool = Pool::load(set, &name).await;
    debug!("Pool for {} holds {} packages", name, pool.len());

    Ok(select(&pool, |source| set.is_installed(source), &name, constraint.as_ref()))
}

/// Chooses among the candidates of `matcher`. Without a constraint an
/// installed candidate wins; otherwise the policy order decides.
pub fn select<M, F>(matcher: &M, is_installed: F, name: &str, constraint: Option<&Constraint>) -> ResolutionResult
where
    M: Matcher + ?Sized,
    F: Fn(usize) -> bool,
{
    let from_installed = |id: PackageId| matcher.source_of(id).is_some_and(&is_installed);

    let mut result = ResolutionResult::default();
    let mut candidates = Vec::new();
    let mut chosen = None;

    for id in matcher.what_provides(name, constraint) {
        let Some(package) = matcher.package(id) else {
            continue;
        };
        // providers and replacers only stand in for the name
        if package.name != name {
            continue;
        }

        if constraint.is_none() && from_installed(id) {
            chosen = Some(id);
        }

        result
            .versions
            .insert(package.pretty_version.clone(), package.version.clone());
        candidates.push(id);
    }

    if chosen.is_none() && !candidates.is_empty() {
        chosen = matcher.select_preferred(&candidates).first().copied();
    }

    if let Some(id) = chosen {
        result.package = matcher.package(id).cloned();
        result.installed = from_installed(id);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{ArrayRepository, MockPackageSource, PackageSource, SourceKind};
    use anyhow::anyhow;
    use serde_json::json;
    use std::sync::Arc;

    fn package(name: &str, version: &str) -> Package {
        Package::new(name, version).unwrap()
    }

    fn source(name: &str, kind: SourceKind, packages: Vec<Package>) -> Arc<dyn PackageSource> {
        Arc::new(ArrayRepository::new(name, kind, packages))
    }

    #[test]
    fn test_providers_are_discarded() {
        let replacer = Package::from_value(json!({
            "name": "alice/monolith",
            "version": "3.0.0",
            "replace": {"alice/widget": "self.version"}
        }))
        .unwrap();
        let pool = Pool::new(vec![(0, replacer)]);

        let result = select(&pool, |_| false, "alice/widget", None);

        assert_eq!(result.package, None);
        assert!(result.versions.is_empty());
        assert_eq!(
            result.found("alice/widget").unwrap_err().to_string(),
            "Package alice/widget not found"
        );
    }

    #[test]
    fn test_installed_preferred_without_constraint() {
        let pool = Pool::new(vec![
            (0, package("alice/widget", "1.0.0")),
            (1, package("alice/widget", "2.0.0")),
        ]);

        // installed source listed after the remote one
        let result = select(&pool, |source| source == 0, "alice/widget", None);
        assert_eq!(result.package.as_ref().unwrap().pretty_version, "1.0.0");
        assert!(result.installed);

        let pool = Pool::new(vec![
            (0, package("alice/widget", "2.0.0")),
            (1, package("alice/widget", "1.0.0")),
        ]);
        let result = select(&pool, |source| source == 1, "alice/widget", None);
        assert_eq!(result.package.as_ref().unwrap().pretty_version, "1.0.0");
        assert!(result.installed);
        assert_eq!(result.sorted_versions(), vec!["2.0.0", "1.0.0"]);
    }

    #[test]
    fn test_constraint_uses_policy() {
        let pool = Pool::new(vec![
            (0, package("alice/widget", "1.0.0")),
            (1, package("alice/widget", "1.5.0")),
            (1, package("alice/widget", "2.0.0")),
        ]);
        let constraint = Constraint::parse("^1.2").unwrap();

        let result = select(&pool, |source| source == 0, "alice/widget", Some(&constraint));

        assert_eq!(result.package.as_ref().unwrap().pretty_version, "1.5.0");
        assert!(!result.installed);
        assert_eq!(result.versions.len(), 1);
    }

    /// Finds a candidate but never ranks it.
    struct NoPreference(Package);

    impl Matcher for NoPreference {
        fn what_provides(&self, _: &str, _: Option<&Constraint>) -> Vec<PackageId> {
            vec![0]
        }

        fn package(&self, id: PackageId) -> Option<&Package> {
            (id == 0).then_some(&self.0)
        }

        fn source_of(&self, _: PackageId) -> Option<usize> {
            Some(0)
        }

        fn select_preferred(&self, _: &[PackageId]) -> Vec<PackageId> {
            Vec::new()
        }
    }

    #[test]
    fn test_inconsistent_matcher() {
        let matcher = NoPreference(package("alice/widget", "1.0.0"));

        let result = select(&matcher, |_| false, "alice/widget", None);

        assert_eq!(result.package, None);
        let err = result.found("alice/widget").unwrap_err();
        assert!(err.to_string().contains("could not select"));
    }

    #[test_log::test(tokio::test)]
    async fn test_resolve_lowercases_and_skips_failing_sources() {
        let mut broken = MockPackageSource::new();
        broken.expect_name().return_const("broken".to_string());
        broken
            .expect_load_packages()
            .returning(|_| Err(anyhow!("connection refused")));

        let installed = source("installed", SourceKind::Installed, vec![package("alice/widget", "1.0.0")]);
        let set = RepositorySet::new(vec![Arc::new(broken), installed.clone()], vec![installed]);

        let result = resolve(&set, "Alice/Widget", None).await.unwrap();

        assert_eq!(result.package.unwrap().name, "alice/widget");
        assert!(result.installed);
    }

    #[tokio::test]
    async fn test_resolve_rejects_bad_constraint() {
        let set = RepositorySet::new(vec![], vec![]);
        let err = resolve(&set, "alice/widget", Some("not a version")).await.unwrap_err();
        assert!(err.to_string().contains("Could not parse version constraint"));
    }
}
