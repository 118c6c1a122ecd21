use anyhow::Result;
use async_trait::async_trait;
use log::{debug, warn};
use std::collections::BTreeMap;

use super::{Listing, PackageSource, SourceKind, answers_to};
use crate::package::{Package, normalize};
use crate::runtime::Runtime;

const PHP_BINARY: &str = "php";

/// The PHP interpreter and its loaded extensions, as `php` and `ext-*` packages.
pub struct PlatformRepository {
    packages: Vec<Package>,
}

impl PlatformRepository {
    /// Asks the local `php` binary for its version and extensions, then
    /// applies `overrides` (`name -> version`, `None` removes the entry).
    /// A missing interpreter yields only the overrides; an override with an
    /// unparseable version is skipped.
    #[tracing::instrument(skip(runtime))]
    pub fn detect<R: Runtime + ?Sized>(
        runtime: &R,
        overrides: &BTreeMap<String, Option<String>>,
    ) -> Result<Self> {
        let mut detected: BTreeMap<String, (String, String)> = BTreeMap::new();

        match query_php(runtime) {
            Ok((php_version, extensions)) => {
                detected.insert(
                    "php".to_string(),
                    (php_version.clone(), "The PHP interpreter".to_string()),
                );
                for extension in extensions {
                    let description = format!("The {} PHP extension", extension);
                    detected.insert(
                        extension_package_name(&extension),
                        (php_version.clone(), description),
                    );
                }
            }
            Err(e) => debug!("PHP interpreter not available: {:#}", e),
        }

        for (name, version) in overrides {
            let name = name.to_lowercase();
            match version {
                Some(version) => {
                    if let Err(e) = normalize(version) {
                        warn!("Ignoring platform override {} {}: {:#}", name, version, e);
                        continue;
                    }
                    let description = "Package overridden via config.platform".to_string();
                    detected.insert(name, (version.clone(), description));
                }
                None => {
                    detected.remove(&name);
                }
            }
        }

        let mut packages = Vec::with_capacity(detected.len());
        for (name, (version, description)) in detected {
            let mut package = match Package::new(&name, &version) {
                Ok(package) => package,
                Err(e) => {
                    warn!("Ignoring platform package {}: {:#}", name, e);
                    continue;
                }
            };
            package.description = Some(description);
            package.package_type = "platform".to_string();
            packages.push(package);
        }

        Ok(Self { packages })
    }

    pub fn from_packages(packages: Vec<Package>) -> Self {
        Self { packages }
    }
}

fn query_php<R: Runtime + ?Sized>(runtime: &R) -> Result<(String, Vec<String>)> {
    let version = runtime.command_output(
        PHP_BINARY,
        &["-r".to_string(), "echo PHP_VERSION;".to_string()],
    )?;
    let version = strip_build_suffix(&version).to_string();

    let modules = runtime.command_output(PHP_BINARY, &["-m".to_string()])?;
    let mut extensions: Vec<String> = modules
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('['))
        .map(str::to_string)
        .collect();
    extensions.sort();
    extensions.dedup();

    Ok((version, extensions))
}

/// `8.3.4-1ubuntu2` -> `8.3.4`
fn strip_build_suffix(version: &str) -> &str {
    let version = version.trim();
    version
        .split(['~', '+', '-'])
        .next()
        .unwrap_or(version)
}

/// `Zend OPcache` -> `ext-zend-opcache`
fn extension_package_name(extension: &str) -> String {
    format!("ext-{}", extension.to_lowercase().replace(' ', "-"))
}

#[async_trait]
impl PackageSource for PlatformRepository {
    fn name(&self) -> &str {
        "platform"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Platform
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
    use anyhow::anyhow;

    fn php_runtime() -> MockRuntime {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_command_output()
            .withf(|program, args| program == "php" && args.first().is_some_and(|a| a == "-r"))
            .returning(|_, _| Ok("8.3.4-1ubuntu2".to_string()));
        runtime
            .expect_command_output()
            .withf(|program, args| program == "php" && args.len() == 1 && args[0] == "-m")
            .returning(|_, _| {
                Ok("[PHP Modules]\nCore\njson\nmbstring\n\n[Zend Modules]\nZend OPcache\n".to_string())
            });
        runtime
    }

    async fn names(repo: &PlatformRepository) -> Vec<String> {
        match repo.list().await.unwrap() {
            Listing::Packages(packages) => packages.into_iter().map(|p| p.name).collect(),
            Listing::Names(names) => names,
        }
    }

    #[tokio::test]
    async fn test_detect() {
        let repo = PlatformRepository::detect(&php_runtime(), &BTreeMap::new()).unwrap();

        assert_eq!(
            names(&repo).await,
            vec!["ext-core", "ext-json", "ext-mbstring", "ext-zend-opcache", "php"]
        );
        let php = repo.load_packages("php").await.unwrap();
        assert_eq!(php[0].pretty_version, "8.3.4");
        assert_eq!(php[0].version, "8.3.4.0");
    }

    #[tokio::test]
    async fn test_overrides() {
        let overrides = BTreeMap::from([
            ("php".to_string(), Some("8.1.0".to_string())),
            ("ext-json".to_string(), None),
            ("ext-intl".to_string(), Some("1.0.0".to_string())),
        ]);
        let repo = PlatformRepository::detect(&php_runtime(), &overrides).unwrap();

        let names = names(&repo).await;
        assert!(names.contains(&"ext-intl".to_string()));
        assert!(!names.contains(&"ext-json".to_string()));
        let php = repo.load_packages("php").await.unwrap();
        assert_eq!(php[0].pretty_version, "8.1.0");
    }

    #[tokio::test]
    async fn test_missing_php() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_command_output()
            .returning(|_, _| Err(anyhow!("No such file or directory")));

        let repo = PlatformRepository::detect(&runtime, &BTreeMap::new()).unwrap();
        assert!(names(&repo).await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_override_is_skipped() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_command_output()
            .returning(|_, _| Err(anyhow!("missing")));
        let overrides = BTreeMap::from([
            ("php".to_string(), Some("eight".to_string())),
            ("ext-json".to_string(), Some("1.5.0".to_string())),
        ]);

        let repo = PlatformRepository::detect(&runtime, &overrides).unwrap();
        assert_eq!(names(&repo).await, vec!["ext-json"]);

        // the detected interpreter survives a bad override
        let repo = PlatformRepository::detect(&php_runtime(), &overrides).unwrap();
        let php = repo.load_packages("php").await.unwrap();
        assert_eq!(php[0].pretty_version, "8.3.4");
    }

    #[test]
    fn test_strip_build_suffix() {
        assert_eq!(strip_build_suffix("8.3.4"), "8.3.4");
        assert_eq!(strip_build_suffix("8.3.4-1ubuntu2"), "8.3.4");
        assert_eq!(strip_build_suffix("7.4.3+deb"), "7.4.3");
    }
}
