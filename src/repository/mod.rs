//! Package sources.
//!
//! This module provides a unified interface over the places packages come
//! from (the project's installed packages, the PHP platform, and remote
//! Composer repositories), and the [`RepositorySet`] that composes them.

mod array;
mod composer;
mod installed;
mod platform;
mod set;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

use crate::package::Package;

pub use array::ArrayRepository;
pub use composer::{ComposerRepository, DEFAULT_PACKAGIST_URL};
pub use installed::InstalledRepository;
pub use platform::PlatformRepository;
pub use set::{ListedPackage, ListingGroup, Mode, RepositorySet, SourceCatalog, missing_project_notice};

/// Role a source plays in a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    Platform,
    Available,
    Installed,
}

impl SourceKind {
    /// Listing groups, in display order.
    pub const DISPLAY_ORDER: [SourceKind; 3] = [
        SourceKind::Platform,
        SourceKind::Available,
        SourceKind::Installed,
    ];
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Platform => write!(f, "platform"),
            SourceKind::Available => write!(f, "available"),
            SourceKind::Installed => write!(f, "installed"),
        }
    }
}

/// What a source can enumerate.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    Packages(Vec<Package>),
    /// Sources that are too large to enumerate expose names only.
    Names(Vec<String>),
}

/// A place packages are loaded from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PackageSource: Send + Sync {
    /// Display name, e.g. `packagist.org`.
    fn name(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// Every version of the packages named `name`, plus packages that
    /// provide or replace it.
    async fn load_packages(&self, name: &str) -> Result<Vec<Package>>;

    /// Everything this source can enumerate.
    async fn list(&self) -> Result<Listing>;
}

/// Whether a package is named `name` or provides or replaces it.
pub(crate) fn answers_to(package: &Package, name: &str) -> bool {
    package.name == name
        || package
            .provides
            .iter()
            .chain(&package.replaces)
            .any(|link| link.target == name)
}
