use serde::de::DeserializeOwned;
use url::Url;

use crate::github::models::{NewRepository, Page, RateLimitOverview, Repository, User};
use crate::github::Result;

// -------------------------------------------------------------------------------------------------
// Listing
// -------------------------------------------------------------------------------------------------
/// A paginated collection on the hosting platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Listing {
    /// Organizations a user belongs to
    UserOrgs { login: String },

    /// Members of an organization
    OrgMembers { org: String },

    /// All repositories of a user
    UserRepos { login: String },

    /// All repositories of an organization
    OrgRepos { org: String },

    /// Repositories the authenticated user can access, private ones included
    OwnRepos,

    /// Pull requests of a repository in any state
    Pulls { owner: String, repo: String },

    /// Commits of a single pull request
    PullCommits { owner: String, repo: String, number: u64 },

    /// Contributors of a repository
    Contributors { owner: String, repo: String },

    /// Commits of a repository authored by the given login
    CommitsByAuthor { owner: String, repo: String, author: String },

    /// Commit search
    SearchCommits { query: String, sort: Option<String>, order: String },

    /// Pull request search
    SearchPulls { query: String, sort: Option<String>, order: String },
}

impl Listing {
    /// Is this a search listing, whose results are capped at 1000 per query?
    pub fn is_search(&self) -> bool {
        matches!(self, Listing::SearchCommits { .. } | Listing::SearchPulls { .. })
    }

    /// The same search with a different sort and order; other listings are returned unchanged.
    pub fn reordered(&self, sort: Option<&str>, order: &str) -> Listing {
        let sort = sort.map(str::to_owned);
        let order = order.to_owned();
        match self {
            Listing::SearchCommits { query, .. } => Listing::SearchCommits {
                query: query.clone(),
                sort,
                order,
            },
            Listing::SearchPulls { query, .. } => Listing::SearchPulls {
                query: query.clone(),
                sort,
                order,
            },
            other => other.clone(),
        }
    }

    /// The URL path parts and query parameters of the first page of this listing.
    pub fn endpoint(&self) -> (Vec<String>, Vec<(&'static str, String)>) {
        fn parts(ps: &[&str]) -> Vec<String> {
            ps.iter().map(|p| p.to_string()).collect()
        }

        fn search_params(query: String, sort: &Option<String>, order: &str) -> Vec<(&'static str, String)> {
            let mut params = vec![("q", query)];
            if let Some(sort) = sort {
                params.push(("sort", sort.clone()));
                params.push(("order", order.to_owned()));
            }
            params
        }

        let (path, mut params) = match self {
            Listing::UserOrgs { login } => (parts(&["users", login, "orgs"]), vec![]),
            Listing::OrgMembers { org } => (parts(&["orgs", org, "members"]), vec![]),
            Listing::UserRepos { login } => {
                (parts(&["users", login, "repos"]), vec![("type", "all".to_owned())])
            }
            Listing::OrgRepos { org } => (parts(&["orgs", org, "repos"]), vec![]),
            Listing::OwnRepos => (parts(&["user", "repos"]), vec![("type", "all".to_owned())]),
            Listing::Pulls { owner, repo } => {
                (parts(&["repos", owner, repo, "pulls"]), vec![("state", "all".to_owned())])
            }
            Listing::PullCommits { owner, repo, number } => {
                let number = number.to_string();
                (parts(&["repos", owner, repo, "pulls", &number, "commits"]), vec![])
            }
            Listing::Contributors { owner, repo } => {
                (parts(&["repos", owner, repo, "contributors"]), vec![])
            }
            Listing::CommitsByAuthor { owner, repo, author } => {
                (parts(&["repos", owner, repo, "commits"]), vec![("author", author.clone())])
            }
            Listing::SearchCommits { query, sort, order } => {
                (parts(&["search", "commits"]), search_params(query.clone(), sort, order))
            }
            Listing::SearchPulls { query, sort, order } => (
                parts(&["search", "issues"]),
                search_params(format!("{query} is:pr"), sort, order),
            ),
        };
        params.push(("per_page", "100".to_owned()));
        (path, params)
    }
}

impl std::fmt::Display for Listing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (path, params) = self.endpoint();
        write!(f, "/{}", path.join("/"))?;
        for (i, (k, v)) in params.iter().filter(|(k, _)| *k != "per_page").enumerate() {
            write!(f, "{}{k}={v}", if i == 0 { '?' } else { '&' })?;
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------
// Platform
// -------------------------------------------------------------------------------------------------
/// The operations reconnaissance needs from a code-hosting platform.
///
/// Implementations report rate limiting as `github::Error::RateLimited`; retrying is left to the
/// traversal layer.
#[allow(async_fn_in_trait)]
pub trait Platform {
    async fn authenticated_user(&self) -> Result<User>;

    async fn user(&self, login: &str) -> Result<User>;

    async fn rate_limit(&self) -> Result<RateLimitOverview>;

    async fn repository(&self, owner: &str, name: &str) -> Result<Repository>;

    async fn repository_by_id(&self, id: i64) -> Result<Repository>;

    async fn create_repository(&self, new_repo: &NewRepository) -> Result<Repository>;

    async fn delete_repository(&self, owner: &str, name: &str) -> Result<()>;

    /// Fetch one page of `listing`: the first page when `cursor` is `None`, otherwise the page the
    /// cursor points at.
    async fn fetch_page<T: DeserializeOwned>(
        &self,
        listing: &Listing,
        cursor: Option<&Url>,
    ) -> Result<Page<T>>;
}
