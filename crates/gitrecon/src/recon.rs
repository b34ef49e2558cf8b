use anyhow::Context;
use std::collections::{HashMap, HashSet, VecDeque};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::decoy::DecoyPusher;
use crate::dispatch::Dispatch;
use crate::git_url::RepoPath;
use crate::github::models::{Commit, Organization, PullRequest, Repository, User};
use crate::github::Error;
use crate::harvest::Harvester;
use crate::identity::{CommitMetadata, Identity};
use crate::oracle::{Oracle, OracleOptions};
use crate::platform::{Listing, Platform};
use crate::record::{AccountType, ReconRecord, RepositoryRecord, UserRecord};
use crate::search::search_commits;
use crate::traversal::Traversal;

// -------------------------------------------------------------------------------------------------
// ReconOptions
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Clone, Default)]
pub struct ReconOptions {
    /// Include forked repositories when listing an account's repositories
    pub forks: bool,

    /// Harvest identities from the commits of open pull requests
    pub pulls: bool,

    /// The most pull requests to list per repository; unlimited if `None`
    pub max_pulls: Option<usize>,

    /// Fully analyze the members of organizations instead of only reporting them
    pub members: bool,

    /// Resolve the emails found in each repository to accounts with the oracle
    pub contributors: bool,

    /// Search commits and pull requests by login or email
    pub search: bool,

    pub oracle: OracleOptions,
}

/// A user waiting to be analyzed, either by login or already fetched.
enum PendingUser {
    Login(String),
    Fetched(User),
}

impl PendingUser {
    fn login(&self) -> &str {
        match self {
            PendingUser::Login(login) => login,
            PendingUser::Fetched(user) => &user.login,
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Recon
// -------------------------------------------------------------------------------------------------
/// Drives reconnaissance against a platform and emits the resulting records.
///
/// Failures of individual lookups become error records; only failing to write output is an error.
pub struct Recon<'d, P> {
    traversal: Traversal<P>,
    harvester: Harvester,
    pusher: Arc<dyn DecoyPusher>,
    options: ReconOptions,
    dispatch: &'d Dispatch,
}

impl<'d, P: Platform> Recon<'d, P> {
    /// The dispatch's self login is taken to be the authenticated user's login.
    pub fn new(
        traversal: Traversal<P>,
        harvester: Harvester,
        pusher: Arc<dyn DecoyPusher>,
        options: ReconOptions,
        dispatch: &'d Dispatch,
    ) -> Self {
        Recon {
            traversal,
            harvester,
            pusher,
            options,
            dispatch,
        }
    }

    pub fn traversal(&self) -> &Traversal<P> {
        &self.traversal
    }

    fn oracle(&self) -> Oracle<'_, P> {
        Oracle::new(&self.traversal, Arc::clone(&self.pusher), self.options.oracle.clone())
    }

    fn auth_login(&self) -> &str {
        self.dispatch.self_login()
    }

    fn emit(&self, record: ReconRecord) -> anyhow::Result<()> {
        self.dispatch
            .emit(record)
            .context("Failed to write output record")
    }

    fn emit_error(&self, message: String) -> anyhow::Result<()> {
        self.emit(ReconRecord::from_error(message))
    }

    // ---------------------------------------------------------------------------------------------
    // users
    // ---------------------------------------------------------------------------------------------
    /// Analyze the given users and organizations, and with `members`, the members of every
    /// organization reached.
    pub async fn analyse_users(&self, logins: &[String]) -> anyhow::Result<()> {
        let mut queue: VecDeque<PendingUser> =
            logins.iter().map(|l| PendingUser::Login(l.clone())).collect();
        let mut visited = HashSet::new();
        let platform = self.traversal.platform();

        while let Some(pending) = queue.pop_front() {
            if !visited.insert(pending.login().to_lowercase()) {
                continue;
            }
            let user = match pending {
                PendingUser::Fetched(user) => user,
                PendingUser::Login(login) => {
                    if self.traversal.is_global_rate_limit_exceeded() {
                        self.emit_error(format!(
                            "failed to get user '{login}': global rate limit exceeded"
                        ))?;
                        continue;
                    }
                    match self.traversal.retry(|| platform.user(&login)).await {
                        Ok(user) => user,
                        Err(e) => {
                            self.emit_error(format!("failed to get user '{login}': {e}"))?;
                            continue;
                        }
                    }
                }
            };
            self.analyse_user(user, &mut queue).await?;
        }
        Ok(())
    }

    async fn analyse_user(&self, user: User, queue: &mut VecDeque<PendingUser>) -> anyhow::Result<()> {
        let login = user.login.clone();
        let mut record = user_record(&user);
        let account_type = AccountType::from_github(&user.user_type);
        info!("Analyzing {account_type:?} {login}");

        let mut errors = Vec::new();
        let repo_listing = match account_type {
            AccountType::User => {
                let orgs = self
                    .traversal
                    .list_all::<Organization>(&Listing::UserOrgs { login: login.clone() }, None)
                    .await;
                record.organizations = orgs.items.into_iter().map(|o| o.login).collect();
                if let Some(e) = orgs.halted {
                    errors.push(format!("failed to list organizations of '{login}': {e}"));
                }
                Listing::UserRepos { login: login.clone() }
            }
            AccountType::Organization => {
                if let Some(e) = self.analyse_members(&login, queue).await? {
                    errors.push(e);
                }
                Listing::OrgRepos { org: login.clone() }
            }
        };

        let mut user_out = ReconRecord::for_user(record.clone());
        for e in errors {
            user_out.push_error(e);
        }
        self.emit(user_out)?;

        let repos = self.traversal.list_all::<Repository>(&repo_listing, None).await;
        if let Some(e) = &repos.halted {
            let mut out = ReconRecord::from_error(format!("failed to list repositories of '{login}': {e}"));
            out.user = Some(record.clone());
            self.emit(out)?;
        }
        let repos: Vec<Repository> = repos
            .items
            .into_iter()
            .filter(|r| self.options.forks || !r.fork)
            .collect();
        debug!("{login} has {} repositories to analyze", repos.len());

        if self.options.search && account_type == AccountType::User {
            let seen: HashSet<i64> = repos.iter().map(|r| r.id).collect();
            self.emit_search_results(&login, Some(&record), &seen).await?;
        }

        self.analyse_repos(repos, Some(&record)).await
    }

    /// Report or queue the members of `org` that could be listed.
    ///
    /// The error is an output failure; the message describes a failure to list every member.
    async fn analyse_members(
        &self,
        org: &str,
        queue: &mut VecDeque<PendingUser>,
    ) -> anyhow::Result<Option<String>> {
        let members = self
            .traversal
            .list_all::<User>(&Listing::OrgMembers { org: org.to_owned() }, None)
            .await;
        debug!("{org} has {} members", members.items.len());
        let listing_error = members
            .halted
            .map(|e| format!("failed to list members of '{org}': {e}"));

        let platform = self.traversal.platform();
        for member in members.items {
            let fetched = if self.traversal.is_global_rate_limit_exceeded() {
                Err("global rate limit exceeded".to_owned())
            } else {
                self.traversal
                    .retry(|| platform.user(&member.login))
                    .await
                    .map_err(|e| e.to_string())
            };
            match fetched {
                Ok(user) if self.options.members => queue.push_back(PendingUser::Fetched(user)),
                Ok(user) => self.emit(ReconRecord::for_user(user_record(&user)))?,
                Err(e) => {
                    let mut out = ReconRecord::for_user(user_record(&member));
                    out.push_error(format!("failed to get user '{}': {e}", member.login));
                    self.emit(out)?;
                }
            }
        }
        Ok(listing_error)
    }

    // ---------------------------------------------------------------------------------------------
    // repositories
    // ---------------------------------------------------------------------------------------------
    /// Analyze repositories given by URL.
    ///
    /// Repositories of the authenticated user are looked up in that user's own listing, so that
    /// private ones are found.
    pub async fn analyse_repo_urls(&self, urls: &[String]) -> anyhow::Result<()> {
        let platform = self.traversal.platform();
        let mut own_repos: Option<HashMap<String, Repository>> = None;
        let mut repos = Vec::new();

        for url in urls {
            let path = match RepoPath::from_str(url) {
                Ok(path) => path,
                Err(message) => {
                    self.emit_error(format!("invalid repository '{url}': {message}"))?;
                    continue;
                }
            };

            if !self.auth_login().is_empty() && path.owner.eq_ignore_ascii_case(self.auth_login()) {
                if own_repos.is_none() {
                    own_repos = Some(self.list_own_repos().await?);
                }
                match own_repos.as_ref().and_then(|own| own.get(&path.name.to_lowercase())) {
                    Some(repo) => repos.push(repo.clone()),
                    None => self.emit_error(format!(
                        "failed to get repository '{path}': not found among the authenticated user's repositories"
                    ))?,
                }
                continue;
            }

            if self.traversal.is_global_rate_limit_exceeded() {
                self.emit_error(format!("failed to get repository '{path}': global rate limit exceeded"))?;
                continue;
            }
            match self
                .traversal
                .retry(|| platform.repository(&path.owner, &path.name))
                .await
            {
                Ok(repo) => repos.push(repo),
                Err(e) => self.emit_error(format!("failed to get repository '{path}': {e}"))?,
            }
        }

        self.analyse_repos(repos, None).await
    }

    /// The authenticated user's own repositories that could be listed, by lowercased name.
    async fn list_own_repos(&self) -> anyhow::Result<HashMap<String, Repository>> {
        let repos = self.traversal.list_all::<Repository>(&Listing::OwnRepos, None).await;
        if let Some(e) = &repos.halted {
            self.emit_error(format!("failed to list the authenticated user's repositories: {e}"))?;
        }
        Ok(repos
            .items
            .into_iter()
            .filter(|r| r.owner.login.eq_ignore_ascii_case(self.auth_login()))
            .map(|r| (r.name.to_lowercase(), r))
            .collect())
    }

    /// Harvest, merge, optionally enrich, and emit one record per repository.
    pub async fn analyse_repos(&self, repos: Vec<Repository>, user: Option<&UserRecord>) -> anyhow::Result<()> {
        let mut pending: HashMap<i64, (RepositoryRecord, Vec<String>)> = HashMap::new();
        let mut location_to_id: HashMap<String, i64> = HashMap::new();
        let mut locations = Vec::new();

        for repo in &repos {
            if pending.contains_key(&repo.id) {
                continue;
            }
            let mut record = repository_record(repo);
            let mut errors = Vec::new();
            if self.options.pulls {
                self.harvest_pulls(repo, &mut record.metadata, &mut errors).await;
            }
            let location = if repo.clone_url.is_empty() {
                repo.html_url.clone()
            } else {
                repo.clone_url.clone()
            };
            location_to_id.insert(location.clone(), repo.id);
            locations.push(location);
            pending.insert(repo.id, (record, errors));
        }
        if locations.is_empty() {
            return Ok(());
        }

        let mut results = self
            .harvester
            .harvest(locations)
            .context("Failed to start repository harvester")?;
        while let Some(result) = results.recv().await {
            let Some((mut record, errors)) = location_to_id
                .get(&result.location)
                .and_then(|id| pending.remove(id))
            else {
                continue;
            };

            let mut out_errors = errors;
            match result.result {
                Ok(metadata) => record.metadata.merge(metadata),
                Err(e) => out_errors.push(format!("failed to clone '{}': {e}", result.location)),
            }

            if self.options.contributors && !record.metadata.is_empty() {
                let correlation = self.oracle().correlate(&record.metadata.emails()).await;
                record.contributors = correlation.users;
                out_errors.extend(correlation.errors);
            }

            let mut out = ReconRecord::for_repository(record);
            for e in out_errors {
                out.push_error(e);
            }
            out.user = user.cloned();
            self.emit(out)?;
        }
        Ok(())
    }

    /// Record the author and committer identities of the commits of `repo`'s unmerged pull
    /// requests. Merged pull requests are skipped; their commits are in the clone.
    async fn harvest_pulls(&self, repo: &Repository, metadata: &mut CommitMetadata, errors: &mut Vec<String>) {
        if self.traversal.is_global_rate_limit_exceeded() {
            errors.push(format!("failed to list pull requests of '{}': global rate limit exceeded", repo.html_url));
            return;
        }
        let listing = Listing::Pulls {
            owner: repo.owner.login.clone(),
            repo: repo.name.clone(),
        };
        let pulls = self
            .traversal
            .list_all::<PullRequest>(&listing, self.options.max_pulls)
            .await;
        if let Some(e) = &pulls.halted {
            errors.push(format!("failed to list pull requests of '{}': {e}", repo.html_url));
        }

        let unmerged = pulls.items.iter().filter(|p| p.merged_at.is_none());
        let listed = self
            .traversal
            .for_each_until_exhausted(unmerged, |pull| {
                let listing = Listing::PullCommits {
                    owner: repo.owner.login.clone(),
                    repo: repo.name.clone(),
                    number: pull.number,
                };
                async move { Ok::<_, Error>(self.traversal.list_all::<Commit>(&listing, None).await) }
            })
            .await;

        for commits in listed.items {
            for commit in &commits.items {
                let details = &commit.commit;
                for sig in [&details.author, &details.committer].into_iter().flatten() {
                    metadata.insert(Identity::new(&sig.email, &sig.name));
                }
            }
            if let Some(e) = commits.halted {
                errors.push(format!("failed to list pull request commits of '{}': {e}", repo.html_url));
            }
        }
    }

    // ---------------------------------------------------------------------------------------------
    // emails
    // ---------------------------------------------------------------------------------------------
    /// Resolve emails to accounts with the oracle, and with `search`, search commits by each email.
    pub async fn analyse_emails(&self, emails: &[String]) -> anyhow::Result<()> {
        let correlation = self.oracle().correlate(emails).await;
        for user in correlation.users {
            self.emit(ReconRecord::for_user(user))?;
        }
        for e in correlation.errors {
            self.emit_error(e)?;
        }

        if self.options.search {
            for email in emails {
                self.emit_search_results(email, None, &HashSet::new()).await?;
            }
        }
        Ok(())
    }

    /// Emit one record per repository found by searching for `target`, skipping `seen` ones.
    async fn emit_search_results(
        &self,
        target: &str,
        user: Option<&UserRecord>,
        seen: &HashSet<i64>,
    ) -> anyhow::Result<()> {
        let outcome = search_commits(&self.traversal, target).await;
        for e in outcome.errors {
            self.emit_error(format!("failed to search commits of '{target}': {e}"))?;
        }

        let mut order = Vec::new();
        let mut by_repo: HashMap<i64, RepositoryRecord> = HashMap::new();
        for hit in &outcome.hits {
            let Some(repo) = hit.repository.as_ref() else {
                continue;
            };
            if seen.contains(&repo.id) {
                continue;
            }
            let record = by_repo.entry(repo.id).or_insert_with(|| {
                order.push(repo.id);
                repository_record(repo)
            });
            record.metadata.extend(hit.identities());
        }

        for id in order {
            if let Some(record) = by_repo.remove(&id) {
                let mut out = ReconRecord::for_repository(record);
                out.user = user.cloned();
                self.emit(out)?;
            }
        }
        Ok(())
    }
}

fn user_record(user: &User) -> UserRecord {
    UserRecord {
        login: user.login.clone(),
        name: user.name.clone().unwrap_or_default(),
        account_type: Some(AccountType::from_github(&user.user_type)),
        organizations: Vec::new(),
        emails: user.email.iter().filter(|e| !e.is_empty()).cloned().collect(),
    }
}

fn repository_record(repo: &Repository) -> RepositoryRecord {
    RepositoryRecord {
        id: Some(repo.id),
        owner: repo.owner.login.clone(),
        name: repo.name.clone(),
        fork: Some(repo.fork),
        location: repo.html_url.clone(),
        ..Default::default()
    }
}
