//! Client for the release and commit endpoints of a GitHub-compatible API.

mod repo;
mod types;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;

use crate::http::HttpClient;

pub use repo::RepoCoordinates;
pub use types::{Commit, CommitDetail, Release};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Upper bound on release pages fetched per repository.
const MAX_RELEASE_PAGES: usize = 10;
const RELEASES_PER_PAGE: usize = 100;

/// Remote release history of a repository.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReleaseHistory: Send + Sync {
    /// All releases, newest first.
    async fn get_releases(&self, repo: &RepoCoordinates) -> Result<Vec<Release>>;

    /// The most recent non-draft, non-prerelease release.
    async fn get_latest_release(&self, repo: &RepoCoordinates) -> Result<Release>;

    /// A single commit by SHA (short or full) or branch name.
    async fn get_commit(&self, repo: &RepoCoordinates, reference: &str) -> Result<Commit>;
}

pub struct GitHub {
    http_client: HttpClient,
    api_url: String,
}

impl GitHub {
    #[tracing::instrument(skip(http_client, api_url))]
    pub fn new(http_client: HttpClient, api_url: Option<String>) -> Self {
        let api_url = api_url
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self {
            http_client,
            api_url,
        }
    }

    fn repo_url(&self, repo: &RepoCoordinates) -> String {
        format!("{}/repos/{}/{}", self.api_url, repo.owner, repo.repo)
    }
}

#[async_trait]
impl ReleaseHistory for GitHub {
    #[tracing::instrument(skip(self))]
    async fn get_releases(&self, repo: &RepoCoordinates) -> Result<Vec<Release>> {
        let url = format!("{}/releases", self.repo_url(repo));
        let mut releases = Vec::new();

        for page in 1..=MAX_RELEASE_PAGES {
            debug!("Fetching releases page {} from {}...", page, url);

            let page_str = page.to_string();
            let per_page = RELEASES_PER_PAGE.to_string();
            let parsed: Vec<Release> = self
                .http_client
                .get_json_with_query(&url, &[("per_page", &per_page), ("page", &page_str)])
                .await
                .with_context(|| format!("Failed to fetch releases of {}", repo))?;

            let len = parsed.len();
            releases.extend(parsed);

            if len < RELEASES_PER_PAGE {
                break;
            }
        }

        Ok(releases)
    }

    #[tracing::instrument(skip(self))]
    async fn get_latest_release(&self, repo: &RepoCoordinates) -> Result<Release> {
        let url = format!("{}/releases/latest", self.repo_url(repo));
        debug!("Fetching latest release from {}...", url);
        self.http_client
            .get_json(&url)
            .await
            .with_context(|| format!("Failed to fetch the latest release of {}", repo))
    }

    #[tracing::instrument(skip(self))]
    async fn get_commit(&self, repo: &RepoCoordinates, reference: &str) -> Result<Commit> {
        let url = format!("{}/commits/{}", self.repo_url(repo), reference);
        debug!("Fetching commit from {}...", url);
        self.http_client
            .get_json(&url)
            .await
            .with_context(|| format!("Failed to fetch commit {} of {}", reference, repo))
    }
}
