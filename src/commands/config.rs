use anyhow::{Context, Result};
use log::{debug, warn};
use reqwest::{
    Client,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::{
    github::{GitHub, ReleaseHistory},
    http::HttpClient,
    package::Package,
    project::{Project, RepositoryConfig},
    repository::{
        ArrayRepository, ComposerRepository, InstalledRepository, PackageSource,
        PlatformRepository, SourceCatalog, SourceKind,
    },
    runtime::Runtime,
};

const USER_AGENT: &str = "composer-history";
const GITHUB_HOST: &str = "github.com";

#[derive(Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
struct AuthFile {
    #[serde(default)]
    github_oauth: BTreeMap<String, String>,
}

pub struct Config<R: Runtime, H: ReleaseHistory> {
    pub runtime: R,
    pub github: H,
    /// Client for Composer repositories; never carries the GitHub token.
    pub repo_client: HttpClient,
    pub project: Option<Project>,
    pub packagist_url: Option<String>,
}

impl<R: Runtime> Config<R, GitHub> {
    pub fn new(
        runtime: R,
        working_dir: Option<PathBuf>,
        api_url: Option<String>,
        packagist_url: Option<String>,
    ) -> Result<Self> {
        let dir = match working_dir {
            Some(dir) => dir,
            None => runtime.current_dir()?,
        };
        let project = Project::load(&runtime, &dir)?;

        let mut headers = HeaderMap::new();
        if let Some(token) = github_token(&runtime, project.as_ref()) {
            let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
                .context("GitHub token contains invalid characters")?;
            auth_value.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth_value);
            debug!("Using GitHub token for authentication: {}", mask(&token));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;
        let github = GitHub::new(HttpClient::new(client), api_url);

        let repo_client = HttpClient::new(Client::builder().user_agent(USER_AGENT).build()?);

        Ok(Self {
            runtime,
            github,
            repo_client,
            project,
            packagist_url,
        })
    }
}

impl<R: Runtime, H: ReleaseHistory> Config<R, H> {
    fn packagist(&self) -> Result<Arc<dyn PackageSource>> {
        Ok(Arc::new(ComposerRepository::packagist(
            self.packagist_url.as_deref(),
            self.repo_client.clone(),
        )?))
    }

    /// Every source a command may look at.
    #[tracing::instrument(skip(self))]
    pub fn catalog(&self) -> Result<SourceCatalog> {
        let overrides = self
            .project
            .as_ref()
            .map(Project::platform_overrides)
            .unwrap_or_default();
        let platform: Arc<dyn PackageSource> =
            Arc::new(PlatformRepository::detect(&self.runtime, &overrides)?);

        let Some(project) = &self.project else {
            return Ok(SourceCatalog {
                installed: None,
                platform,
                remotes: Vec::new(),
                defaults: vec![self.packagist()?],
            });
        };

        let installed: Arc<dyn PackageSource> =
            Arc::new(InstalledRepository::load(&self.runtime, &project.vendor_dir())?);

        let mut remotes: Vec<Arc<dyn PackageSource>> = Vec::new();
        for repository in &project.repositories {
            match repository {
                RepositoryConfig::Composer { url } => {
                    let repository =
                        ComposerRepository::new(url.clone(), url, self.repo_client.clone())?;
                    remotes.push(Arc::new(repository));
                }
                RepositoryConfig::Package { packages } => {
                    let packages = packages
                        .iter()
                        .cloned()
                        .map(Package::from_value)
                        .collect::<Result<Vec<_>>>()
                        .context("Invalid inline package repository")?;
                    remotes.push(Arc::new(ArrayRepository::new(
                        "package",
                        SourceKind::Available,
                        packages,
                    )));
                }
                RepositoryConfig::Unsupported { kind } => {
                    warn!("Repositories of type {} are not supported, skipping", kind);
                }
            }
        }
        if project.packagist_enabled {
            remotes.push(self.packagist()?);
        }

        Ok(SourceCatalog {
            installed: Some(installed),
            platform,
            remotes,
            defaults: vec![self.packagist()?],
        })
    }
}

/// `GITHUB_TOKEN`, then the project's `config.github-oauth`, then the
/// user's Composer `auth.json`.
fn github_token<R: Runtime + ?Sized>(runtime: &R, project: Option<&Project>) -> Option<String> {
    if let Ok(token) = runtime.env_var("GITHUB_TOKEN") {
        if !token.is_empty() {
            return Some(token);
        }
    }

    if let Some(token) = project.and_then(Project::github_token) {
        return Some(token.to_string());
    }

    let auth_path = composer_home(runtime)?.join("auth.json");
    if !runtime.exists(&auth_path) {
        return None;
    }
    let content = runtime.read_to_string(&auth_path).ok()?;
    match serde_json::from_str::<AuthFile>(&content) {
        Ok(auth) => auth.github_oauth.get(GITHUB_HOST).cloned(),
        Err(e) => {
            debug!("Ignoring unreadable {}: {}", auth_path.display(), e);
            None
        }
    }
}

/// `COMPOSER_HOME`, else `<config dir>/composer` when it exists, else `~/.composer`.
fn composer_home<R: Runtime + ?Sized>(runtime: &R) -> Option<PathBuf> {
    if let Ok(home) = runtime.env_var("COMPOSER_HOME") {
        if !home.is_empty() {
            return Some(PathBuf::from(home));
        }
    }

    if let Some(dir) = runtime.config_dir().map(|d| d.join("composer")) {
        if runtime.exists(&dir) {
            return Some(dir);
        }
    }

    runtime.home_dir().map(|home| home.join(".composer"))
}

/// Keeps only enough of a token to recognise it in logs.
fn mask(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        return "*********".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}*********{}", head, tail)
}
