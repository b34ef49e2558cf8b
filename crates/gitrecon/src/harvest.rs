use git2::Repository;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, debug_span, warn};

use crate::commit_walk::collect_commit_metadata;
use crate::git_binary::{Git, GitError};
use crate::identity::CommitMetadata;
use crate::progress::Progress;

// -------------------------------------------------------------------------------------------------
// HarvestError
// -------------------------------------------------------------------------------------------------
#[derive(Debug)]
pub enum HarvestError {
    TempDir(std::io::Error),
    Clone(GitError),
    Open(git2::Error),
    Walk(git2::Error),
}

impl std::fmt::Display for HarvestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HarvestError::TempDir(e) => write!(f, "failed to create temporary directory: {e}"),
            HarvestError::Clone(e) => write!(f, "failed to clone: {e}"),
            HarvestError::Open(e) => write!(f, "failed to open repository: {e}"),
            HarvestError::Walk(e) => write!(f, "failed to extract metadata: {e}"),
        }
    }
}

impl std::error::Error for HarvestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HarvestError::TempDir(e) => Some(e),
            HarvestError::Clone(e) => Some(e),
            HarvestError::Open(e) => Some(e),
            HarvestError::Walk(e) => Some(e),
        }
    }
}

// -------------------------------------------------------------------------------------------------
// HarvestMode
// -------------------------------------------------------------------------------------------------
/// How the harvester gets hold of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestMode {
    /// Clone each location into its own temporary directory, removed afterwards
    Clone,

    /// Open each location in place as a local repository
    Local,
}

/// The outcome of harvesting a single location.
#[derive(Debug)]
pub struct HarvestResult {
    pub location: String,
    pub result: Result<CommitMetadata, HarvestError>,
}

// -------------------------------------------------------------------------------------------------
// Harvester
// -------------------------------------------------------------------------------------------------
/// A fixed-size pool of worker threads that extracts commit identities from repositories.
pub struct Harvester {
    git: Arc<Git>,
    mode: HarvestMode,
    threads: usize,
    progress_enabled: bool,
}

impl Harvester {
    pub fn new(git: Arc<Git>, mode: HarvestMode, threads: usize) -> Self {
        Harvester {
            git,
            mode,
            threads: threads.max(1),
            progress_enabled: false,
        }
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress_enabled = enabled;
        self
    }

    /// Start harvesting the given locations.
    ///
    /// Results arrive on the returned channel in completion order. The channel is closed once
    /// every worker has finished.
    pub fn harvest(
        &self,
        locations: Vec<String>,
    ) -> std::io::Result<mpsc::UnboundedReceiver<HarvestResult>> {
        let total = locations.len();
        let (work_send, work_recv) = crossbeam_channel::unbounded::<String>();
        for location in locations {
            work_send
                .send(location)
                .expect("work queue receiver should be alive");
        }
        drop(work_send);

        let (out_send, out_recv) = mpsc::unbounded_channel();
        let num_workers = self.threads.min(total.max(1));
        let progress = Progress::new_bar(total as u64, "Harvesting repositories", self.progress_enabled);
        let remaining = Arc::new(AtomicUsize::new(num_workers));

        debug!("Harvesting {total} locations with {num_workers} workers");
        for id in 0..num_workers {
            let worker = Worker {
                git: Arc::clone(&self.git),
                mode: self.mode,
                work: work_recv.clone(),
                out: out_send.clone(),
                progress: progress.clone(),
                remaining: Arc::clone(&remaining),
            };
            std::thread::Builder::new()
                .name(format!("harvester-{id}"))
                .spawn(move || worker.run())?;
        }

        Ok(out_recv)
    }
}

struct Worker {
    git: Arc<Git>,
    mode: HarvestMode,
    work: crossbeam_channel::Receiver<String>,
    out: mpsc::UnboundedSender<HarvestResult>,
    progress: Progress,
    remaining: Arc<AtomicUsize>,
}

impl Worker {
    fn run(self) {
        for location in self.work.iter() {
            let result = self.harvest_one(&location);
            self.progress.inc(1);
            if self.out.send(HarvestResult { location, result }).is_err() {
                debug!("Harvest results receiver dropped; stopping worker");
                break;
            }
        }
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.progress.finish();
        }
    }

    fn harvest_one(&self, location: &str) -> Result<CommitMetadata, HarvestError> {
        let _span = debug_span!("harvest", "{location}").entered();
        match self.mode {
            HarvestMode::Local => {
                let repo = Repository::open(location).map_err(HarvestError::Open)?;
                collect_commit_metadata(&repo).map_err(HarvestError::Walk)
            }
            HarvestMode::Clone => {
                let tmpdir = tempfile::Builder::new()
                    .prefix("gitrecon")
                    .tempdir()
                    .map_err(HarvestError::TempDir)?;
                self.git
                    .create_bare_clone(location, tmpdir.path())
                    .map_err(HarvestError::Clone)?;
                let metadata = {
                    let repo = Repository::open_bare(tmpdir.path()).map_err(HarvestError::Open)?;
                    collect_commit_metadata(&repo).map_err(HarvestError::Walk)?
                };
                let path = tmpdir.path().to_owned();
                if let Err(e) = tmpdir.close() {
                    warn!("Failed to remove temporary clone at {}: {e}", path.display());
                }
                Ok(metadata)
            }
        }
    }
}
