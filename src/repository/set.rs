use anyhow::{Result, bail};
use log::warn;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Listing, PackageSource, SourceKind};
use crate::package::{Package, version_compare};

/// Which sources a command looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Platform,
    Installed,
    Available,
    Default,
}

impl Mode {
    /// `--platform` wins over `--installed`, which wins over `--available`.
    pub fn from_flags(platform: bool, installed: bool, available: bool) -> Self {
        if platform {
            Mode::Platform
        } else if installed {
            Mode::Installed
        } else if available {
            Mode::Available
        } else {
            Mode::Default
        }
    }
}

/// The sources a set is built from.
pub struct SourceCatalog {
    /// The project's installed packages; `None` without a project.
    pub installed: Option<Arc<dyn PackageSource>>,
    pub platform: Arc<dyn PackageSource>,
    /// Remote sources configured by the project.
    pub remotes: Vec<Arc<dyn PackageSource>>,
    /// Remote sources used when there is no project.
    pub defaults: Vec<Arc<dyn PackageSource>>,
}

/// One row of a listing.
#[derive(Debug, Clone, PartialEq)]
pub enum ListedPackage {
    Package(Package),
    /// Known by name only.
    Placeholder(String),
}

/// Listing rows of one kind, sorted by name.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingGroup {
    pub kind: SourceKind,
    pub entries: Vec<ListedPackage>,
}

/// An ordered set of package sources with a distinguished installed view.
pub struct RepositorySet {
    sources: Vec<Arc<dyn PackageSource>>,
    installed: Vec<Arc<dyn PackageSource>>,
}

impl RepositorySet {
    pub fn new(sources: Vec<Arc<dyn PackageSource>>, installed: Vec<Arc<dyn PackageSource>>) -> Self {
        Self { sources, installed }
    }

    /// Composes the sources a mode looks at. Without a project, `Installed`
    /// is an error and the other modes fall back to the default remotes.
    pub fn build(mode: Mode, catalog: SourceCatalog) -> Result<Self> {
        let SourceCatalog {
            installed,
            platform,
            remotes,
            defaults,
        } = catalog;

        let set = match (mode, installed) {
            (Mode::Platform, _) => Self::new(vec![platform.clone()], vec![platform]),
            (Mode::Installed, Some(local)) => Self::new(vec![local.clone()], vec![local]),
            (Mode::Installed, None) => {
                bail!("Composer could not find a composer.json file in the current directory")
            }
            (Mode::Available, Some(_)) => Self::new(remotes, vec![platform]),
            (Mode::Available, None) => {
                eprintln!("{}", missing_project_notice(&defaults));
                Self::new(defaults, vec![platform])
            }
            (Mode::Default, Some(local)) => {
                let installed = vec![local, platform];
                let mut sources = installed.clone();
                sources.extend(remotes);
                Self::new(sources, installed)
            }
            (Mode::Default, None) => {
                eprintln!("{}", missing_project_notice(&defaults));
                let mut sources = vec![platform.clone()];
                sources.extend(defaults);
                Self::new(sources, vec![platform])
            }
        };

        Ok(set)
    }

    pub fn sources(&self) -> &[Arc<dyn PackageSource>] {
        &self.sources
    }

    /// Whether the source at `index` belongs to the installed view.
    pub fn is_installed(&self, index: usize) -> bool {
        self.sources
            .get(index)
            .is_some_and(|source| self.installed.iter().any(|i| Arc::ptr_eq(i, source)))
    }

    fn group_of(&self, index: usize, source: &dyn PackageSource) -> SourceKind {
        if source.kind() == SourceKind::Platform {
            SourceKind::Platform
        } else if self.is_installed(index) {
            SourceKind::Installed
        } else {
            SourceKind::Available
        }
    }

    /// The newest package per name, grouped by kind in display order.
    /// Sources that fail to list are skipped with a warning.
    #[tracing::instrument(skip(self))]
    pub async fn listing(&self) -> Vec<ListingGroup> {
        let mut groups: BTreeMap<SourceKind, BTreeMap<String, ListedPackage>> = BTreeMap::new();

        for (index, source) in self.sources.iter().enumerate() {
            let listing = match source.list().await {
                Ok(listing) => listing,
                Err(e) => {
                    warn!("Skipping {}: {:#}", source.name(), e);
                    continue;
                }
            };

            let group = groups.entry(self.group_of(index, source.as_ref())).or_default();
            match listing {
                Listing::Names(names) => {
                    for name in names {
                        group
                            .entry(name.clone())
                            .or_insert(ListedPackage::Placeholder(name));
                    }
                }
                Listing::Packages(packages) => {
                    for package in packages {
                        keep_newest(group, package);
                    }
                }
            }
        }

        SourceKind::DISPLAY_ORDER
            .iter()
            .filter_map(|kind| {
                groups.remove(kind).map(|entries| ListingGroup {
                    kind: *kind,
                    entries: entries.into_values().collect(),
                })
            })
            .collect()
    }
}

fn keep_newest(group: &mut BTreeMap<String, ListedPackage>, package: Package) {
    let replace = match group.get(&package.name) {
        Some(ListedPackage::Package(existing)) => {
            version_compare(&existing.version, &package.version).is_lt()
        }
        Some(ListedPackage::Placeholder(_)) | None => true,
    };
    if replace {
        group.insert(package.name.clone(), ListedPackage::Package(package));
    }
}

/// Notice shown when there is no project to read repositories from.
pub fn missing_project_notice(defaults: &[Arc<dyn PackageSource>]) -> String {
    let names: Vec<&str> = defaults.iter().map(|s| s.name()).collect();
    format!(
        "No composer.json found in the current directory, showing available packages from {}",
        names.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{ArrayRepository, MockPackageSource};
    use anyhow::anyhow;

    fn package(name: &str, version: &str) -> Package {
        Package::new(name, version).unwrap()
    }

    fn source(name: &str, kind: SourceKind, packages: Vec<Package>) -> Arc<dyn PackageSource> {
        Arc::new(ArrayRepository::new(name, kind, packages))
    }

    fn catalog(with_project: bool) -> SourceCatalog {
        SourceCatalog {
            installed: with_project.then(|| {
                source("installed", SourceKind::Installed, vec![package("alice/widget", "1.0.0")])
            }),
            platform: source("platform", SourceKind::Platform, vec![package("php", "8.3.0")]),
            remotes: vec![source("project-remote", SourceKind::Available, vec![])],
            defaults: vec![source("packagist.org", SourceKind::Available, vec![])],
        }
    }

    fn names(set: &RepositorySet) -> Vec<&str> {
        set.sources().iter().map(|s| s.name()).collect()
    }

    #[test]
    fn test_mode_precedence() {
        assert_eq!(Mode::from_flags(true, true, true), Mode::Platform);
        assert_eq!(Mode::from_flags(false, true, true), Mode::Installed);
        assert_eq!(Mode::from_flags(false, false, true), Mode::Available);
        assert_eq!(Mode::from_flags(false, false, false), Mode::Default);
    }

    #[test]
    fn test_build_platform() {
        let set = RepositorySet::build(Mode::Platform, catalog(true)).unwrap();
        assert_eq!(names(&set), vec!["platform"]);
        assert!(set.is_installed(0));
    }

    #[test]
    fn test_build_installed() {
        let set = RepositorySet::build(Mode::Installed, catalog(true)).unwrap();
        assert_eq!(names(&set), vec!["installed"]);
        assert!(set.is_installed(0));

        let err = RepositorySet::build(Mode::Installed, catalog(false)).err().unwrap();
        assert!(err.to_string().contains("composer.json"));
    }

    #[test]
    fn test_build_available() {
        let set = RepositorySet::build(Mode::Available, catalog(true)).unwrap();
        assert_eq!(names(&set), vec!["project-remote"]);
        assert!(!set.is_installed(0));

        let set = RepositorySet::build(Mode::Available, catalog(false)).unwrap();
        assert_eq!(names(&set), vec!["packagist.org"]);
    }

    #[test]
    fn test_build_default() {
        let set = RepositorySet::build(Mode::Default, catalog(true)).unwrap();
        assert_eq!(names(&set), vec!["installed", "platform", "project-remote"]);
        assert!(set.is_installed(0));
        assert!(set.is_installed(1));
        assert!(!set.is_installed(2));
        assert!(!set.is_installed(3));

        let set = RepositorySet::build(Mode::Default, catalog(false)).unwrap();
        assert_eq!(names(&set), vec!["platform", "packagist.org"]);
        assert!(set.is_installed(0));
        assert!(!set.is_installed(1));
    }

    #[test]
    fn test_missing_project_notice() {
        let defaults = catalog(false).defaults;
        assert_eq!(
            missing_project_notice(&defaults),
            "No composer.json found in the current directory, showing available packages from packagist.org"
        );
    }

    #[tokio::test]
    async fn test_listing_keeps_newest_per_group() {
        let installed = source(
            "installed",
            SourceKind::Installed,
            vec![package("alice/widget", "1.0.0"), package("bob/gadget", "2.0.0")],
        );
        let platform = source("platform", SourceKind::Platform, vec![package("php", "8.3.0")]);
        let remote = source(
            "remote",
            SourceKind::Available,
            vec![
                package("alice/widget", "1.0.0"),
                package("alice/widget", "1.2.0"),
                package("alice/widget", "1.1.0"),
            ],
        );
        let set = RepositorySet::new(
            vec![installed.clone(), platform.clone(), remote],
            vec![installed, platform],
        );

        let groups = set.listing().await;

        let kinds: Vec<SourceKind> = groups.iter().map(|g| g.kind).collect();
        assert_eq!(
            kinds,
            vec![SourceKind::Platform, SourceKind::Available, SourceKind::Installed]
        );
        assert_eq!(groups[1].entries, vec![ListedPackage::Package(package("alice/widget", "1.2.0"))]);
        let installed_names: Vec<String> = groups[2]
            .entries
            .iter()
            .map(|e| match e {
                ListedPackage::Package(p) => p.name.clone(),
                ListedPackage::Placeholder(n) => n.clone(),
            })
            .collect();
        assert_eq!(installed_names, vec!["alice/widget", "bob/gadget"]);
    }

    #[tokio::test]
    async fn test_listing_placeholders_never_replace_packages() {
        let mut names_only = MockPackageSource::new();
        names_only.expect_name().return_const("names".to_string());
        names_only.expect_kind().return_const(SourceKind::Available);
        names_only.expect_list().returning(|| {
            Ok(Listing::Names(vec!["alice/widget".to_string(), "carol/thing".to_string()]))
        });

        let full = source("full", SourceKind::Available, vec![package("alice/widget", "1.0.0")]);
        let set = RepositorySet::new(vec![full, Arc::new(names_only)], vec![]);

        let groups = set.listing().await;

        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups[0].entries,
            vec![
                ListedPackage::Package(package("alice/widget", "1.0.0")),
                ListedPackage::Placeholder("carol/thing".to_string()),
            ]
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_listing_skips_failing_source() {
        let mut broken = MockPackageSource::new();
        broken.expect_name().return_const("broken".to_string());
        broken.expect_kind().return_const(SourceKind::Available);
        broken
            .expect_list()
            .returning(|| Err(anyhow!("connection refused")));

        let platform = source("platform", SourceKind::Platform, vec![package("php", "8.3.0")]);
        let set = RepositorySet::new(vec![Arc::new(broken), platform.clone()], vec![platform]);

        let groups = set.listing().await;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].kind, SourceKind::Platform);
    }
}
