//! Release history of a package, from its installed version up to the
//! latest release published on the hosting service.

mod view;

use log::debug;

use crate::github::{Release, ReleaseHistory, RepoCoordinates};
use crate::package::{Package, normalize, version_compare, versions_match};

pub use view::{HistoryView, ReleaseEntry, format_date};

/// Shown when the commit behind a dev version cannot be fetched.
pub const DESCRIPTION_NOT_ACCESSIBLE: &str = "Description not accessible";

/// Builds [`HistoryView`]s from package metadata and a release history service.
pub struct HistoryProjector<'a, H: ReleaseHistory + ?Sized> {
    history: &'a H,
}

impl<'a, H: ReleaseHistory + ?Sized> HistoryProjector<'a, H> {
    pub fn new(history: &'a H) -> Self {
        Self { history }
    }

    /// Every remote failure degrades to an absent or empty field. A package
    /// whose source URL names no repository gets no remote lookups at all.
    #[tracing::instrument(skip(self, package), fields(package = %package.pretty_name))]
    pub async fn project(&self, package: &Package) -> HistoryView {
        let version = package.format_version();
        let mut view = HistoryView {
            bundle: package.pretty_name.clone(),
            installed: ReleaseEntry {
                name: version.clone(),
                description: None,
                release_date: package.time.as_deref().and_then(format_date),
            },
            latest: None,
            included: Vec::new(),
        };

        let Some(repo) = package.source_url().and_then(RepoCoordinates::from_source_url) else {
            debug!("No release history for {}: source is not a hosted repository", package.name);
            return view;
        };

        let releases = match self.history.get_releases(&repo).await {
            Ok(releases) => releases,
            Err(e) => {
                debug!("Release list of {} unavailable: {:#}", repo, e);
                Vec::new()
            }
        };

        view.installed.description = if package.is_dev() {
            Some(self.commit_message(&repo, package, &version).await)
        } else {
            release_description(&releases, &version)
        };

        let latest = match self.history.get_latest_release(&repo).await {
            Ok(latest) => Some(latest),
            Err(e) => {
                debug!("Latest release of {} unavailable: {:#}", repo, e);
                None
            }
        };

        let installed_version = (!package.is_dev()).then_some(package.version.as_str());
        view.included = included_releases(
            &releases,
            &version,
            installed_version,
            latest.as_ref().map(|r| r.tag_name.as_str()),
        );
        view.latest = latest.as_ref().map(ReleaseEntry::from_release);

        view
    }

    async fn commit_message(&self, repo: &RepoCoordinates, package: &Package, version: &str) -> String {
        let reference = commit_reference(package, version);
        match self.history.get_commit(repo, &reference).await {
            Ok(commit) => commit.commit.message,
            Err(e) => {
                debug!("Commit {} of {} unavailable: {:#}", reference, repo, e);
                DESCRIPTION_NOT_ACCESSIBLE.to_string()
            }
        }
    }
}

/// The commit a dev version points at: the reference after the space in
/// `dev-master abc1234`, else the branch itself.
fn commit_reference(package: &Package, version: &str) -> String {
    if let Some((_, reference)) = version.split_once(' ') {
        return reference.to_string();
    }
    let pretty = package.pretty_version.as_str();
    pretty
        .strip_prefix("dev-")
        .or_else(|| pretty.strip_suffix("-dev"))
        .unwrap_or(pretty)
        .to_string()
}

fn matches_version(release: &Release, version: &str) -> bool {
    versions_match(&release.tag_name, version) || release.name.as_deref() == Some(version)
}

/// Body of the release published for `version`; `None` when there is no
/// such release or it has no body.
fn release_description(releases: &[Release], version: &str) -> Option<String> {
    releases
        .iter()
        .find(|r| matches_version(r, version))
        .and_then(|r| r.body.clone())
}

/// Releases newer than the installed one, newest first, without the latest.
///
/// `releases` is in the order the service returns them (newest first). The
/// scan stops at the installed release, or at the first release whose tag
/// is not newer than `installed_version` when one is given. Nothing is
/// included when the latest release is the installed one.
pub fn included_releases(
    releases: &[Release],
    installed: &str,
    installed_version: Option<&str>,
    latest: Option<&str>,
) -> Vec<ReleaseEntry> {
    let mut included = Vec::new();

    if let Some(tag) = latest {
        let latest_is_installed = match releases.iter().find(|r| r.tag_name == tag) {
            Some(release) => matches_version(release, installed),
            None => versions_match(tag, installed),
        };
        if latest_is_installed {
            return included;
        }
    }

    for release in releases {
        if latest.is_some_and(|tag| release.tag_name == tag) {
            continue;
        }
        if matches_version(release, installed) {
            break;
        }
        if installed_version.is_some_and(|installed| is_not_newer(release, installed)) {
            break;
        }
        included.push(ReleaseEntry::from_release(release));
    }

    included
}

fn is_not_newer(release: &Release, installed_version: &str) -> bool {
    normalize(&release.tag_name).is_ok_and(|tag| version_compare(&tag, installed_version).is_le())
}
