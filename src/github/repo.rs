/// Owner and repository slug on the hosting service.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct RepoCoordinates {
    pub owner: String,
    pub repo: String,
}

impl RepoCoordinates {
    /// Derives coordinates from a package source URL.
    ///
    /// Accepts `https://host/owner/repo(.git)` and the SSH remote form
    /// `user@host:owner/repo(.git)`. The HTTPS form is tried first.
    pub fn from_source_url(url: &str) -> Option<Self> {
        let url = url.trim();
        let path = strip_https_prefix(url).or_else(|| strip_ssh_prefix(url))?;

        let mut segments = path.split('/');
        let owner = segments.next()?;
        let repo = segments.next()?;
        let repo = repo.strip_suffix(".git").unwrap_or(repo);

        if owner.is_empty() || repo.is_empty() {
            return None;
        }

        Some(RepoCoordinates {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }
}

fn strip_https_prefix(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let (host, path) = rest.split_once('/')?;
    if host.is_empty() { None } else { Some(path) }
}

fn strip_ssh_prefix(url: &str) -> Option<&str> {
    let (user_host, path) = url.split_once(':')?;
    let (user, host) = user_host.split_once('@')?;
    if user.is_empty() || host.is_empty() || user_host.contains('/') {
        return None;
    }
    Some(path)
}

impl std::fmt::Display for RepoCoordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}
