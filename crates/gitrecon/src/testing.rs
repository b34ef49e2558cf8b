//! Test doubles and fixtures shared by the unit tests of this crate.

use git2::{Oid, Repository as GitRepository, Signature};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;

use crate::decoy::{DecoyError, DecoyPusher, PreparedDecoy, SkippedEmail};
use crate::dispatch::RecordSink;
use crate::github::models::{ClientError, NewRepository, Page, RateLimitOverview, Repository, User};
use crate::github::{Error, Result};
use crate::platform::{Listing, Platform};
use crate::record::ReconRecord;

// -------------------------------------------------------------------------------------------------
// FixtureRepo
// -------------------------------------------------------------------------------------------------
/// A Git repository in a temporary directory, with helpers for writing commits directly to refs.
pub struct FixtureRepo {
    dir: TempDir,
    repo: GitRepository,
}

impl FixtureRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("should be able to create tempdir");
        let repo = GitRepository::init(dir.path()).expect("should be able to init repository");
        FixtureRepo { dir, repo }
    }

    pub fn repo(&self) -> &GitRepository {
        &self.repo
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn location(&self) -> String {
        self.dir.path().display().to_string()
    }

    /// Write a commit with the same author and committer to `refname`.
    pub fn commit(&self, refname: &str, parents: &[Oid], email: &str, name: &str) -> Oid {
        self.commit_with(refname, parents, (email, name), (email, name))
    }

    pub fn commit_with(
        &self,
        refname: &str,
        parents: &[Oid],
        author: (&str, &str),
        committer: (&str, &str),
    ) -> Oid {
        let author = Signature::now(author.1, author.0).unwrap();
        let committer = Signature::now(committer.1, committer.0).unwrap();
        let tree_id = self.repo.treebuilder(None).unwrap().write().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();
        let parents: Vec<git2::Commit> =
            parents.iter().map(|p| self.repo.find_commit(*p).unwrap()).collect();
        let parents: Vec<&git2::Commit> = parents.iter().collect();
        let oid = self
            .repo
            .commit(None, &author, &committer, "fixture commit", &tree, &parents)
            .unwrap();
        self.set_ref(refname, oid);
        oid
    }

    pub fn set_ref(&self, refname: &str, oid: Oid) {
        self.repo.reference(refname, oid, true, "fixture").unwrap();
    }

    pub fn set_head(&self, refname: &str) {
        self.repo.set_head(refname).unwrap();
    }
}

// -------------------------------------------------------------------------------------------------
// CollectingSink
// -------------------------------------------------------------------------------------------------
/// A record sink that keeps everything written to it.
#[derive(Default)]
pub struct CollectingSink {
    records: Mutex<Vec<ReconRecord>>,
}

impl CollectingSink {
    pub fn records(&self) -> Vec<ReconRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl RecordSink for CollectingSink {
    fn write_record(&self, record: &ReconRecord) -> std::io::Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------
// FakePlatform
// -------------------------------------------------------------------------------------------------
/// A scripted failure of a platform call.
#[derive(Debug, Clone)]
pub enum Failure {
    /// The core quota is exhausted
    GlobalRateLimit,

    /// The search quota is exhausted and resets after `wait`
    SearchRateLimit { wait: Duration },

    /// A rate limit that does not name its resource
    UnnamedRateLimit,

    /// Any other unsuccessful response
    Api { status: u16, message: String },
}

impl Failure {
    fn to_error(&self) -> Error {
        let rate_limited = |wait, resource: Option<&str>| Error::RateLimited {
            client_error: ClientError {
                message: "API rate limit exceeded".into(),
                documentation_url: None,
            },
            wait,
            resource: resource.map(str::to_owned),
            secondary: false,
        };
        match self {
            Failure::GlobalRateLimit => rate_limited(Some(Duration::from_secs(3600)), Some("core")),
            Failure::SearchRateLimit { wait } => rate_limited(Some(*wait), Some("search")),
            Failure::UnnamedRateLimit => rate_limited(None, None),
            Failure::Api { status, message } => Error::ApiError {
                status: *status,
                message: message.clone(),
            },
        }
    }
}

type Response = std::result::Result<Value, Failure>;

/// An in-memory platform whose responses are scripted per call.
///
/// Calls are identified by keys such as `GET /users/octocat`; listing pages by
/// `GET <listing>` for the first page and `GET <listing> page <n>` after that. Each key has a
/// queue of responses: responses are consumed in order, and the last one repeats.
///
/// Unscripted listings are empty, unscripted deletes succeed, and other unscripted calls fail with
/// 404.
pub struct FakePlatform {
    responses: RefCell<HashMap<String, VecDeque<Response>>>,
    page_counts: RefCell<HashMap<String, usize>>,
    calls: RefCell<Vec<String>>,
}

impl FakePlatform {
    pub fn new(login: &str) -> Self {
        let fake = FakePlatform {
            responses: RefCell::new(HashMap::new()),
            page_counts: RefCell::new(HashMap::new()),
            calls: RefCell::new(Vec::new()),
        };
        fake.respond("GET /user", Ok(Self::user_body(login, "User")));
        fake
    }

    pub fn user_body(login: &str, user_type: &str) -> Value {
        json!({ "login": login, "id": 1000, "type": user_type, "html_url": format!("https://github.com/{login}") })
    }

    pub fn repo_body(id: i64, owner: &str, name: &str, fork: bool) -> Value {
        json!({
            "id": id,
            "name": name,
            "full_name": format!("{owner}/{name}"),
            "owner": { "login": owner },
            "private": false,
            "fork": fork,
            "html_url": format!("https://github.com/{owner}/{name}"),
            "clone_url": format!("https://github.com/{owner}/{name}.git"),
        })
    }

    pub fn rate_limit_body(core_remaining: i64, search_remaining: i64) -> Value {
        json!({
            "resources": {
                "core": { "limit": 5000, "remaining": core_remaining, "reset": 1700000000, "used": 5000 - core_remaining },
                "search": { "limit": 30, "remaining": search_remaining, "reset": 1700000000, "used": 30 - search_remaining },
            },
            "rate": { "limit": 5000, "remaining": core_remaining, "reset": 1700000000, "used": 5000 - core_remaining },
        })
    }

    /// Add a response to the queue for `key`.
    pub fn respond(&self, key: &str, response: Response) {
        self.responses
            .borrow_mut()
            .entry(key.to_owned())
            .or_default()
            .push_back(response);
    }

    /// Make the next call of `key` fail, before any other queued response.
    pub fn fail_once(&self, key: &str, failure: Failure) {
        self.responses
            .borrow_mut()
            .entry(key.to_owned())
            .or_default()
            .push_front(Err(failure));
    }

    /// Script the pages of `listing`. Search listings take search result bodies; others take arrays.
    pub fn pages(&self, listing: &Listing, pages: Vec<Value>) {
        self.page_counts
            .borrow_mut()
            .insert(listing.to_string(), pages.len());
        for (i, page) in pages.into_iter().enumerate() {
            self.respond(&Self::page_key(listing, i), Ok(page));
        }
    }

    pub fn fail_page(&self, listing: &Listing, page: usize, failure: Failure) {
        self.fail_once(&Self::page_key(listing, page), failure);
    }

    pub fn page_key(listing: &Listing, page: usize) -> String {
        if page == 0 {
            format!("GET {listing}")
        } else {
            format!("GET {listing} page {page}")
        }
    }

    /// Count the calls of `key`, including calls of it with query parameters or to later pages.
    pub fn count_calls(&self, key: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| {
                c.as_str() == key
                    || c.strip_prefix(key)
                        .map_or(false, |rest| rest.starts_with('?') || rest.starts_with(' '))
            })
            .count()
    }

    fn next_response(&self, key: &str) -> Option<Response> {
        self.calls.borrow_mut().push(key.to_owned());
        let mut responses = self.responses.borrow_mut();
        let queue = responses.get_mut(key)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    fn call<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        match self.next_response(key) {
            Some(Ok(value)) => Ok(serde_json::from_value(value).expect("fake response should deserialize")),
            Some(Err(failure)) => Err(failure.to_error()),
            None => Err(Failure::Api {
                status: 404,
                message: "Not Found".into(),
            }
            .to_error()),
        }
    }
}

impl Platform for FakePlatform {
    async fn authenticated_user(&self) -> Result<User> {
        self.call("GET /user")
    }

    async fn user(&self, login: &str) -> Result<User> {
        self.call(&format!("GET /users/{login}"))
    }

    async fn rate_limit(&self) -> Result<RateLimitOverview> {
        self.call("GET /rate_limit")
    }

    async fn repository(&self, owner: &str, name: &str) -> Result<Repository> {
        self.call(&format!("GET /repos/{owner}/{name}"))
    }

    async fn repository_by_id(&self, id: i64) -> Result<Repository> {
        self.call(&format!("GET /repositories/{id}"))
    }

    async fn create_repository(&self, new_repo: &NewRepository) -> Result<Repository> {
        assert!(new_repo.private, "decoy repositories must be private");
        self.call("POST /user/repos")
    }

    async fn delete_repository(&self, owner: &str, name: &str) -> Result<()> {
        let key = format!("DELETE /repos/{owner}/{name}");
        match self.next_response(&key) {
            Some(Err(failure)) => Err(failure.to_error()),
            _ => Ok(()),
        }
    }

    async fn fetch_page<T: DeserializeOwned>(
        &self,
        listing: &Listing,
        cursor: Option<&Url>,
    ) -> Result<Page<T>> {
        let page = match cursor {
            None => 0,
            Some(url) => url
                .query_pairs()
                .find(|(k, _)| k == "page")
                .and_then(|(_, v)| v.parse().ok())
                .expect("fake cursor should carry a page number"),
        };
        let num_pages = self
            .page_counts
            .borrow()
            .get(&listing.to_string())
            .copied()
            .unwrap_or(0);
        let key = Self::page_key(listing, page);

        let value = match self.next_response(&key) {
            Some(Ok(value)) => value,
            Some(Err(failure)) => return Err(failure.to_error()),
            None if listing.is_search() => json!({ "total_count": 0, "items": [] }),
            None => json!([]),
        };

        let next = if page + 1 < num_pages {
            Some(Url::parse(&format!("https://fake.invalid/?page={}", page + 1)).unwrap())
        } else {
            None
        };

        if listing.is_search() {
            let body: crate::github::models::SearchResults<T> =
                serde_json::from_value(value).expect("fake search page should deserialize");
            Ok(Page {
                items: body.items,
                next,
                total_count: Some(body.total_count),
            })
        } else {
            Ok(Page {
                items: serde_json::from_value(value).expect("fake page should deserialize"),
                next,
                total_count: None,
            })
        }
    }
}

// -------------------------------------------------------------------------------------------------
// FakePusher
// -------------------------------------------------------------------------------------------------
/// A decoy pusher that builds nothing and records what it was asked to do.
///
/// Emails containing angle brackets are skipped, as they are when building a real decoy.
#[derive(Default)]
pub struct FakePusher {
    prepared: Mutex<Vec<Vec<String>>>,
    pushed: Mutex<Vec<String>>,
    fail_push: bool,
}

impl FakePusher {
    pub fn failing() -> Self {
        FakePusher {
            fail_push: true,
            ..Default::default()
        }
    }

    /// The emails of each prepared decoy, in order.
    pub fn prepared(&self) -> Vec<Vec<String>> {
        self.prepared.lock().unwrap().clone()
    }

    pub fn pushed(&self) -> Vec<String> {
        self.pushed.lock().unwrap().clone()
    }
}

impl DecoyPusher for FakePusher {
    fn prepare(&self, emails: &[String]) -> std::result::Result<PreparedDecoy, DecoyError> {
        self.prepared.lock().unwrap().push(emails.to_vec());
        let (unusable, usable): (Vec<&String>, Vec<&String>) =
            emails.iter().partition(|e| e.contains(['<', '>']));
        let skipped = unusable
            .into_iter()
            .map(|e| SkippedEmail {
                email: e.clone(),
                reason: "contains angle brackets".into(),
            })
            .collect();
        Ok(PreparedDecoy::detached(usable.len(), skipped))
    }

    fn push(&self, _decoy: &PreparedDecoy, remote_url: &str) -> std::result::Result<(), DecoyError> {
        self.pushed.lock().unwrap().push(remote_url.to_owned());
        if self.fail_push {
            Err(DecoyError::Io(std::io::Error::new(std::io::ErrorKind::Other, "push refused")))
        } else {
            Ok(())
        }
    }
}
