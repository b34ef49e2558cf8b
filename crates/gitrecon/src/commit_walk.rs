use git2::{ReferenceType, Repository};
use tracing::{debug, trace};

use crate::identity::{CommitMetadata, Identity};

/// Collect the author and committer identities of every commit reachable from the local
/// branches and remote-tracking references of `repo`.
///
/// Each commit is visited once no matter how many references reach it. Symbolic references and
/// tags are not followed.
pub fn collect_commit_metadata(repo: &Repository) -> Result<CommitMetadata, git2::Error> {
    let mut walk = repo.revwalk()?;
    let mut num_refs = 0usize;

    for reference in repo.references()? {
        let reference = reference?;
        if !(reference.is_branch() || reference.is_remote()) {
            continue;
        }
        if reference.kind() != Some(ReferenceType::Direct) {
            trace!("Skipping symbolic reference {:?}", reference.name());
            continue;
        }
        let commit = match reference.peel_to_commit() {
            Ok(commit) => commit,
            Err(e) => {
                debug!("Skipping reference {:?}: {e}", reference.name());
                continue;
            }
        };
        walk.push(commit.id())?;
        num_refs += 1;
    }

    let mut metadata = CommitMetadata::new();
    if num_refs == 0 {
        return Ok(metadata);
    }

    let mut num_commits = 0usize;
    for oid in walk {
        let commit = repo.find_commit(oid?)?;
        metadata.insert(Identity::from_signature(&commit.committer()));
        metadata.insert(Identity::from_signature(&commit.author()));
        num_commits += 1;
    }
    debug!(
        "Walked {num_commits} commits from {num_refs} references; found {} identities",
        metadata.len()
    );

    Ok(metadata)
}
