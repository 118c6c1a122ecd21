use serde::{Deserialize, Serialize};

/// A release as returned by the releases API.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
}

/// A commit as returned by `GET /repos/{owner}/{repo}/commits/{ref}`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Commit {
    pub sha: String,
    pub commit: CommitDetail,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct CommitDetail {
    pub message: String,
}
