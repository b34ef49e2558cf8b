use anyhow::{anyhow, Context};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::decoy::{DecoyPusher, PreparedDecoy};
use crate::github::models::{Commit, Contributor, NewRepository, Repository};
use crate::platform::{Listing, Platform};
use crate::record::UserRecord;
use crate::traversal::Traversal;

/// The most emails that go into a single decoy repository.
pub const MAX_EMAILS_PER_DECOY: usize = 500;

// -------------------------------------------------------------------------------------------------
// OracleOptions
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Clone)]
pub struct OracleOptions {
    /// How long to wait after pushing before asking for contributors
    pub settle: Duration,

    /// How many times to check that a newly created repository is visible
    pub visibility_attempts: u32,

    /// The first delay between visibility checks; doubled after every check
    pub visibility_backoff: Duration,
}

impl Default for OracleOptions {
    fn default() -> Self {
        OracleOptions {
            settle: Duration::from_secs(2),
            visibility_attempts: 10,
            visibility_backoff: Duration::from_secs(1),
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Correlation
// -------------------------------------------------------------------------------------------------
/// What the oracle learned about a set of emails.
#[derive(Debug, Default)]
pub struct Correlation {
    /// One record per account the platform attributed decoy commits to
    pub users: Vec<UserRecord>,

    /// Messages of batches or lookups that failed
    pub errors: Vec<String>,
}

// -------------------------------------------------------------------------------------------------
// Oracle
// -------------------------------------------------------------------------------------------------
/// Resolves email addresses to platform accounts by pushing decoy commits and reading back the
/// platform's contributor attribution.
pub struct Oracle<'t, P> {
    traversal: &'t Traversal<P>,
    pusher: Arc<dyn DecoyPusher>,
    options: OracleOptions,
}

impl<'t, P: Platform> Oracle<'t, P> {
    pub fn new(traversal: &'t Traversal<P>, pusher: Arc<dyn DecoyPusher>, options: OracleOptions) -> Self {
        Oracle {
            traversal,
            pusher,
            options,
        }
    }

    /// Correlate `emails` in sequential batches of at most `MAX_EMAILS_PER_DECOY`.
    ///
    /// A failing batch is reported in the result and does not stop the others.
    pub async fn correlate(&self, emails: &[String]) -> Correlation {
        let mut seen = HashSet::new();
        let emails: Vec<String> = emails
            .iter()
            .filter(|e| !e.is_empty() && seen.insert(e.as_str()))
            .cloned()
            .collect();

        let mut correlation = Correlation::default();
        for (i, batch) in emails.chunks(MAX_EMAILS_PER_DECOY).enumerate() {
            if self.traversal.is_global_rate_limit_exceeded() {
                correlation.errors.push(format!(
                    "global rate limit exceeded; {} emails not correlated",
                    emails.len() - i * MAX_EMAILS_PER_DECOY
                ));
                break;
            }
            info!("Correlating batch {} of {} emails", i + 1, batch.len());
            if let Err(e) = self.correlate_batch(batch, &mut correlation).await {
                correlation.errors.push(format!("{e:#}"));
            }
        }
        correlation
    }

    async fn correlate_batch(&self, emails: &[String], out: &mut Correlation) -> anyhow::Result<()> {
        let decoy = {
            let pusher = Arc::clone(&self.pusher);
            let emails = emails.to_vec();
            tokio::task::spawn_blocking(move || pusher.prepare(&emails))
                .await
                .context("decoy preparation task failed")?
                .context("failed to prepare decoy repository")?
        };
        for skipped in decoy.skipped() {
            out.errors
                .push(format!("failed to correlate email '{}': {}", skipped.email, skipped.reason));
        }
        if decoy.commits() == 0 {
            debug!("No usable emails in batch; not creating a decoy repository");
            return Ok(());
        }

        let new_repo = NewRepository {
            name: uuid::Uuid::new_v4().to_string(),
            private: true,
        };
        let platform = self.traversal.platform();
        let repo = self
            .traversal
            .retry(|| platform.create_repository(&new_repo))
            .await
            .context("failed to create decoy repository")?;
        debug!("Created decoy repository {}", repo.full_name);

        let result = self.inspect(&repo, decoy, out).await;

        // The decoy is deleted exactly once, whatever happened above.
        if let Err(e) = self
            .traversal
            .retry(|| platform.delete_repository(&repo.owner.login, &repo.name))
            .await
        {
            warn!("Failed to delete decoy repository {}: {e}", repo.full_name);
        }

        result
    }

    async fn inspect(
        &self,
        repo: &Repository,
        decoy: PreparedDecoy,
        out: &mut Correlation,
    ) -> anyhow::Result<()> {
        self.await_visibility(repo).await;

        {
            let pusher = Arc::clone(&self.pusher);
            let remote_url = repo.clone_url.clone();
            tokio::task::spawn_blocking(move || pusher.push(&decoy, &remote_url))
                .await
                .context("decoy push task failed")?
                .context("failed to push decoy repository")?;
        }

        tokio::time::sleep(self.options.settle).await;

        let owner = repo.owner.login.clone();
        let name = repo.name.clone();
        let contributors = self
            .traversal
            .list_all::<Contributor>(&Listing::Contributors { owner: owner.clone(), repo: name.clone() }, None)
            .await;
        debug!("Decoy repository {} has {} contributors", repo.full_name, contributors.items.len());
        if let Some(e) = &contributors.halted {
            out.errors.push(format!("failed to list decoy contributors: {e}"));
        }

        let logins = contributors.items.into_iter().filter_map(|c| c.login);
        let partial = self
            .traversal
            .for_each_until_exhausted(logins, |login| {
                let listing = Listing::CommitsByAuthor {
                    owner: owner.clone(),
                    repo: name.clone(),
                    author: login.clone(),
                };
                async move {
                    let commits: Vec<Commit> = self.traversal.list_all(&listing, None).await.into_result()?;
                    Ok(UserRecord {
                        emails: author_emails(&commits),
                        ..UserRecord::with_login(login)
                    })
                }
            })
            .await;

        out.users.extend(partial.items);
        out.errors
            .extend(partial.errors.iter().map(|e| format!("failed to list contributor commits: {e}")));
        match partial.halted {
            Some(e) => Err(anyhow!(e).context("stopped reading decoy contributors")),
            None => Ok(()),
        }
    }

    /// Poll until `repo` can be fetched by id, backing off exponentially.
    ///
    /// Gives up with a warning after the configured number of attempts, or once the global quota
    /// is exhausted.
    async fn await_visibility(&self, repo: &Repository) -> bool {
        let platform = self.traversal.platform();
        let mut delay = self.options.visibility_backoff;
        for attempt in 1..=self.options.visibility_attempts {
            if self.traversal.is_global_rate_limit_exceeded() {
                warn!("Global rate limit exceeded; not waiting for decoy repository {}", repo.full_name);
                return false;
            }
            match self.traversal.retry(|| platform.repository_by_id(repo.id)).await {
                Ok(_) => return true,
                Err(e) => debug!("Decoy repository {} not yet visible (attempt {attempt}): {e}", repo.id),
            }
            if attempt < self.options.visibility_attempts {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
        warn!("Decoy repository {} did not become visible; continuing anyway", repo.full_name);
        false
    }
}

/// The distinct author emails of `commits`, in first-seen order.
fn author_emails(commits: &[Commit]) -> Vec<String> {
    let mut seen = HashSet::new();
    commits
        .iter()
        .filter_map(|c| c.commit.author.as_ref())
        .map(|a| a.email.as_str())
        .filter(|e| !e.is_empty() && seen.insert(*e))
        .map(str::to_owned)
        .collect()
}
