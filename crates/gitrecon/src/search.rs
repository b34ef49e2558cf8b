use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

use crate::git_url::RepoPath;
use crate::github::models::{Commit, GitSignature, Issue, Repository};
use crate::github::Error;
use crate::identity::Identity;
use crate::platform::{Listing, Platform};
use crate::traversal::Traversal;

// -------------------------------------------------------------------------------------------------
// Role
// -------------------------------------------------------------------------------------------------
/// Which side of a commit a search matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Author,
    Committer,
}

impl Role {
    const ALL: [Role; 2] = [Role::Author, Role::Committer];

    fn name(self) -> &'static str {
        match self {
            Role::Author => "author",
            Role::Committer => "committer",
        }
    }

    /// The search qualifier matching `target`, which is either an email or a login.
    pub fn qualifier(self, target: &str) -> String {
        if target.contains('@') {
            format!("{}-email:{target}", self.name())
        } else {
            format!("{}:{target}", self.name())
        }
    }

    fn date_sort(self) -> &'static str {
        match self {
            Role::Author => "author-date",
            Role::Committer => "committer-date",
        }
    }
}

// -------------------------------------------------------------------------------------------------
// CommitHit
// -------------------------------------------------------------------------------------------------
/// A commit found by searching, with the roles under which it matched.
#[derive(Debug, Clone)]
pub struct CommitHit {
    pub sha: String,
    pub repository: Option<Repository>,
    pub author: Option<GitSignature>,
    pub committer: Option<GitSignature>,
    pub author_match: bool,
    pub committer_match: bool,
}

impl CommitHit {
    /// The identities of the matched roles.
    pub fn identities(&self) -> Vec<Identity> {
        let mut identities = Vec::with_capacity(2);
        let roles = [
            (self.author_match, &self.author),
            (self.committer_match, &self.committer),
        ];
        for (matched, signature) in roles {
            if let (true, Some(sig)) = (matched, signature) {
                identities.push(Identity::new(&sig.email, &sig.name));
            }
        }
        identities
    }
}

// -------------------------------------------------------------------------------------------------
// Ledger
// -------------------------------------------------------------------------------------------------
/// Commit hits deduplicated by SHA, remembering every role each one matched under.
#[derive(Debug, Default)]
pub struct Ledger {
    hits: Vec<CommitHit>,
    index: HashMap<String, usize>,
}

impl Ledger {
    pub fn record(
        &mut self,
        commit: Commit,
        repository: Option<Repository>,
        author_match: bool,
        committer_match: bool,
    ) {
        if let Some(&i) = self.index.get(&commit.sha) {
            let hit = &mut self.hits[i];
            hit.author_match |= author_match;
            hit.committer_match |= committer_match;
            if hit.repository.is_none() {
                hit.repository = repository.or(commit.repository);
            }
            return;
        }
        self.index.insert(commit.sha.clone(), self.hits.len());
        self.hits.push(CommitHit {
            sha: commit.sha,
            repository: repository.or(commit.repository),
            author: commit.commit.author,
            committer: commit.commit.committer,
            author_match,
            committer_match,
        });
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn into_hits(self) -> Vec<CommitHit> {
        self.hits
    }
}

// -------------------------------------------------------------------------------------------------
// SearchOutcome
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub hits: Vec<CommitHit>,

    /// Failures of individual searches or lookups; the remaining ones still ran unless the
    /// global quota was exhausted
    pub errors: Vec<Error>,
}

/// Search commits and pull requests attributed to `target`, a login or an email address.
///
/// Commits are searched by author and by committer. For logins, pull requests authored by the
/// login are searched too, and all commits of each one are taken with both roles matched; pull
/// request search has no email qualifier.
pub async fn search_commits<P: Platform>(traversal: &Traversal<P>, target: &str) -> SearchOutcome {
    let mut ledger = Ledger::default();
    let mut errors = Vec::new();

    for role in Role::ALL {
        if traversal.is_global_rate_limit_exceeded() {
            break;
        }
        let listing = Listing::SearchCommits {
            query: role.qualifier(target),
            sort: None,
            order: "desc".into(),
        };
        let sorts = [None, Some(role.date_sort())];
        let commits = traversal
            .search_exhaustively(&listing, &sorts, |c: &Commit| c.sha.clone())
            .await;
        debug!("{} commits match {listing}", commits.items.len());
        for commit in commits.items {
            ledger.record(commit, None, role == Role::Author, role == Role::Committer);
        }
        errors.extend(commits.halted);
    }

    if !target.contains('@') && !traversal.is_global_rate_limit_exceeded() {
        search_pull_requests(traversal, target, &mut ledger, &mut errors).await;
    }

    debug!("Search for {target} found {} distinct commits", ledger.len());
    SearchOutcome {
        hits: ledger.into_hits(),
        errors,
    }
}

async fn search_pull_requests<P: Platform>(
    traversal: &Traversal<P>,
    target: &str,
    ledger: &mut Ledger,
    errors: &mut Vec<Error>,
) {
    let listing = Listing::SearchPulls {
        query: Role::Author.qualifier(target),
        sort: None,
        order: "desc".into(),
    };
    let issues = traversal
        .search_exhaustively(&listing, &[None, Some("created")], |i: &Issue| {
            (i.repository_url.clone(), i.number)
        })
        .await;
    debug!("{} pull requests match {listing}", issues.items.len());
    errors.extend(issues.halted);
    let issues: Vec<Issue> = issues.items;

    let platform = traversal.platform();
    let mut repositories: HashMap<String, Repository> = HashMap::new();
    for issue in issues {
        if traversal.is_global_rate_limit_exceeded() {
            break;
        }
        let repo = match repositories.get(&issue.repository_url) {
            Some(repo) => repo.clone(),
            None => {
                let path = match RepoPath::from_str(&issue.repository_url) {
                    Ok(path) => path,
                    Err(message) => {
                        debug!("Skipping pull request {}: {message}", issue.html_url);
                        continue;
                    }
                };
                let repo = match traversal
                    .retry(|| platform.repository(&path.owner, &path.name))
                    .await
                {
                    Ok(repo) => repo,
                    Err(e) => {
                        errors.push(e);
                        continue;
                    }
                };
                repositories.insert(issue.repository_url.clone(), repo.clone());
                repo
            }
        };

        let commits = traversal
            .list_all::<Commit>(
                &Listing::PullCommits {
                    owner: repo.owner.login.clone(),
                    repo: repo.name.clone(),
                    number: issue.number,
                },
                None,
            )
            .await;
        for commit in commits.items {
            ledger.record(commit, Some(repo.clone()), true, true);
        }
        errors.extend(commits.halted);
    }
}
