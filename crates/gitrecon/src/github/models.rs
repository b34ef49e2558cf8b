use serde::{Deserialize, Serialize};

pub mod page;
pub use page::{Page, SearchResults};

// -------------------------------------------------------------------------------------------------
// ClientError
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
pub struct ClientError {
    pub message: String,
    pub documentation_url: Option<String>,
}

// -------------------------------------------------------------------------------------------------
// RateLimit
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Serialize, Deserialize)]
pub struct RateLimitOverview {
    pub resources: Resources,
    pub rate: Rate,
}

// -------------------------------------------------------------------------------------------------
// Resource
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Serialize, Deserialize)]
pub struct Resources {
    pub core: Rate,
    pub search: Rate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graphql: Option<Rate>,
}

// -------------------------------------------------------------------------------------------------
// Rate
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Serialize, Deserialize)]
pub struct Rate {
    pub limit: i64,
    pub remaining: i64,
    pub reset: i64,
    #[serde(default)]
    pub used: i64,
}

// -------------------------------------------------------------------------------------------------
// User
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
    pub id: i64,
    #[serde(default)]
    pub html_url: String,
    #[serde(rename = "type", default)]
    pub user_type: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

// -------------------------------------------------------------------------------------------------
// Organization
// Defined as in: https://docs.github.com/en/rest/orgs/orgs?apiVersion=2022-11-28#list-organizations-for-a-user
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct Organization {
    pub login: String,
}

// -------------------------------------------------------------------------------------------------
// Repository
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    pub owner: RepositoryOwner,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub clone_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryOwner {
    pub login: String,
}

/// The body of a request to create a repository for the authenticated user.
#[derive(Debug, Clone, Serialize)]
pub struct NewRepository {
    pub name: String,
    pub private: bool,
}

// -------------------------------------------------------------------------------------------------
// PullRequest
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub html_url: String,
    pub merged_at: Option<String>,
}

// -------------------------------------------------------------------------------------------------
// Commit
// -------------------------------------------------------------------------------------------------
/// A commit as returned by the commit listing and commit search endpoints.
///
/// Search results additionally carry the repository the commit was found in.
#[derive(Debug, Clone, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub commit: CommitDetails,
    pub repository: Option<Repository>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitDetails {
    pub author: Option<GitSignature>,
    pub committer: Option<GitSignature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitSignature {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

// -------------------------------------------------------------------------------------------------
// Contributor
// -------------------------------------------------------------------------------------------------
/// A repository contributor. Anonymous contributors have no login.
#[derive(Debug, Clone, Deserialize)]
pub struct Contributor {
    pub login: Option<String>,
    pub id: Option<i64>,
    #[serde(default)]
    pub contributions: u64,
}

// -------------------------------------------------------------------------------------------------
// Issue
// -------------------------------------------------------------------------------------------------
/// An issue search result; pull requests are issues too.
#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: u64,
    #[serde(default)]
    pub html_url: String,
    pub repository_url: String,
}
