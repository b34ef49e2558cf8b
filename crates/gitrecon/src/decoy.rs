use git2::{Oid, Repository, Signature};
use sha1::{Digest, Sha1};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, debug_span};

use crate::git_binary::{Git, GitError};

/// The branch that decoy commits are written to and pushed as.
pub const DECOY_REF: &str = "refs/heads/main";

// -------------------------------------------------------------------------------------------------
// DecoyError
// -------------------------------------------------------------------------------------------------
#[derive(Debug)]
pub enum DecoyError {
    Io(std::io::Error),
    Git(git2::Error),
    Push(GitError),
    NoCommits,
}

impl std::fmt::Display for DecoyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecoyError::Io(e) => write!(f, "I/O error: {e}"),
            DecoyError::Git(e) => write!(f, "failed to build decoy repository: {e}"),
            DecoyError::Push(e) => write!(f, "failed to push decoy repository: {e}"),
            DecoyError::NoCommits => write!(f, "decoy repository has no commits"),
        }
    }
}

impl std::error::Error for DecoyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecoyError::Io(e) => Some(e),
            DecoyError::Git(e) => Some(e),
            DecoyError::Push(e) => Some(e),
            DecoyError::NoCommits => None,
        }
    }
}

impl From<std::io::Error> for DecoyError {
    fn from(err: std::io::Error) -> Self {
        DecoyError::Io(err)
    }
}

impl From<git2::Error> for DecoyError {
    fn from(err: git2::Error) -> Self {
        DecoyError::Git(err)
    }
}

// -------------------------------------------------------------------------------------------------
// PreparedDecoy
// -------------------------------------------------------------------------------------------------
/// An email that cannot be used as a commit identity, such as one containing angle brackets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEmail {
    pub email: String,
    pub reason: String,
}

/// A local decoy repository, ready to be pushed. Its directory is removed on drop.
pub struct PreparedDecoy {
    dir: Option<TempDir>,
    commits: usize,
    skipped: Vec<SkippedEmail>,
}

impl PreparedDecoy {
    /// The number of synthetic commits, one per usable email.
    pub fn commits(&self) -> usize {
        self.commits
    }

    /// The emails that got no commit.
    pub fn skipped(&self) -> &[SkippedEmail] {
        &self.skipped
    }

    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(|d| d.path())
    }

    #[cfg(test)]
    pub(crate) fn detached(commits: usize, skipped: Vec<SkippedEmail>) -> Self {
        PreparedDecoy {
            dir: None,
            commits,
            skipped,
        }
    }
}

// -------------------------------------------------------------------------------------------------
// DecoyPusher
// -------------------------------------------------------------------------------------------------
/// Builds decoy repositories and pushes them to a remote.
///
/// Both operations block and are run off the async runtime's worker threads.
pub trait DecoyPusher: Send + Sync + 'static {
    fn prepare(&self, emails: &[String]) -> Result<PreparedDecoy, DecoyError>;

    fn push(&self, decoy: &PreparedDecoy, remote_url: &str) -> Result<(), DecoyError>;
}

/// The real pusher: builds the repository with `git2` and pushes it with the `git` binary.
pub struct GitDecoyPusher {
    git: Arc<Git>,
}

impl GitDecoyPusher {
    pub fn new(git: Arc<Git>) -> Self {
        GitDecoyPusher { git }
    }
}

impl DecoyPusher for GitDecoyPusher {
    fn prepare(&self, emails: &[String]) -> Result<PreparedDecoy, DecoyError> {
        let dir = tempfile::Builder::new().prefix("gitrecon-decoy").tempdir()?;
        let (commits, skipped) = build_decoy(dir.path(), emails)?;
        Ok(PreparedDecoy {
            dir: Some(dir),
            commits,
            skipped,
        })
    }

    fn push(&self, decoy: &PreparedDecoy, remote_url: &str) -> Result<(), DecoyError> {
        let path = decoy.path().ok_or(DecoyError::NoCommits)?;
        if decoy.commits == 0 {
            return Err(DecoyError::NoCommits);
        }
        let refspec = format!("{DECOY_REF}:{DECOY_REF}");
        self.git
            .push(path, remote_url, &refspec)
            .map_err(DecoyError::Push)
    }
}

/// Write a bare repository at `dir` with one commit per email on `DECOY_REF`.
///
/// Each commit is authored and committed by `email <email>`, appends the SHA-1 digest of the email
/// to a single randomly named file, and has the hex digest as its message. Emails that cannot form
/// a signature are skipped.
fn build_decoy(dir: &Path, emails: &[String]) -> Result<(usize, Vec<SkippedEmail>), DecoyError> {
    let _span = debug_span!("build_decoy", "{}", dir.display()).entered();
    let repo = Repository::init_bare(dir)?;
    let file_name = uuid::Uuid::new_v4().to_string();

    let mut content: Vec<u8> = Vec::with_capacity(emails.len() * 20);
    let mut parent: Option<Oid> = None;
    let mut commits = 0;
    let mut skipped = Vec::new();
    for email in emails {
        let signature = match Signature::now(email, email) {
            Ok(signature) => signature,
            Err(e) => {
                debug!("Skipping email {email:?}: {e}");
                skipped.push(SkippedEmail {
                    email: email.clone(),
                    reason: e.message().to_owned(),
                });
                continue;
            }
        };
        let digest = Sha1::digest(email.as_bytes());
        content.extend_from_slice(&digest);

        let blob = repo.blob(&content)?;
        let mut tree_builder = repo.treebuilder(None)?;
        tree_builder.insert(&file_name, blob, 0o100644)?;
        let tree = repo.find_tree(tree_builder.write()?)?;

        let parents = match parent {
            Some(oid) => vec![repo.find_commit(oid)?],
            None => vec![],
        };
        let parents: Vec<&git2::Commit> = parents.iter().collect();
        let oid = repo.commit(None, &signature, &signature, &hex::encode(digest), &tree, &parents)?;
        parent = Some(oid);
        commits += 1;
    }

    if let Some(head) = parent {
        repo.reference(DECOY_REF, head, true, "decoy")?;
        debug!("Wrote {commits} decoy commits");
    }
    Ok((commits, skipped))
}
