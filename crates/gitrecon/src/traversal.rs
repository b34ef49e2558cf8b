use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::github::models::Page;
use crate::github::{Error, Result};
use crate::platform::{Listing, Platform};

/// Search endpoints never return more than this many results for a single query.
pub const SEARCH_RESULT_WINDOW: u64 = 1000;

/// Added to every platform-reported wait, so that the retry lands after the reset.
const RESET_MARGIN: Duration = Duration::from_secs(1);

/// Used when a soft rate limit does not say how long to wait.
const DEFAULT_SOFT_WAIT: Duration = Duration::from_secs(60);

const SEARCH_ORDERS: [&str; 2] = ["desc", "asc"];

// -------------------------------------------------------------------------------------------------
// Retry
// -------------------------------------------------------------------------------------------------
/// What to do about a failed platform call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    /// Sleep for the given duration, then issue the same call again
    After(Duration),

    /// Report the error to the caller
    GiveUp,
}

// -------------------------------------------------------------------------------------------------
// Partial
// -------------------------------------------------------------------------------------------------
/// The results of a loop of calls that may have stopped early.
///
/// Listings stop at the first failing page; loops of independent calls stop only once the global
/// quota is exhausted.
#[derive(Debug)]
pub struct Partial<T> {
    /// Results gathered before the loop ended, in order
    pub items: Vec<T>,

    /// Errors of calls that failed without stopping the loop
    pub errors: Vec<Error>,

    /// The error that stopped the loop, if any
    pub halted: Option<Error>,
}

impl<T> Default for Partial<T> {
    fn default() -> Self {
        Partial {
            items: Vec::new(),
            errors: Vec::new(),
            halted: None,
        }
    }
}

impl<T> Partial<T> {
    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// All the items, or the error that stopped the loop before it gathered them all.
    pub fn into_result(self) -> Result<Vec<T>> {
        match self.halted {
            Some(e) => Err(e),
            None => Ok(self.items),
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Traversal
// -------------------------------------------------------------------------------------------------
/// Rate-limit-aware access to a platform.
///
/// Every call goes through [`Traversal::retry`]. Soft rate limits are waited out; exhausting the
/// global quota trips a gate that loops consult before issuing further calls.
pub struct Traversal<P> {
    platform: P,
    global_exceeded: AtomicBool,
}

impl<P: Platform> Traversal<P> {
    pub fn new(platform: P) -> Self {
        Traversal {
            platform,
            global_exceeded: AtomicBool::new(false),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Has any call through this traversal exhausted the platform's global quota?
    pub fn is_global_rate_limit_exceeded(&self) -> bool {
        self.global_exceeded.load(Ordering::Acquire)
    }

    /// Decide whether a failed call should be retried.
    pub async fn classify(&self, err: &Error) -> Retry {
        let (wait, resource, secondary) = match err {
            Error::RateLimited {
                wait,
                resource,
                secondary,
                ..
            } => (*wait, resource.as_deref(), *secondary),
            _ => return Retry::GiveUp,
        };

        let global = if secondary {
            false
        } else {
            match resource {
                Some("core") => true,
                Some(_) => false,
                None => self.core_quota_exhausted().await,
            }
        };

        if global {
            warn!("Global rate limit exceeded: {err}");
            self.global_exceeded.store(true, Ordering::Release);
            Retry::GiveUp
        } else {
            Retry::After(wait.unwrap_or(DEFAULT_SOFT_WAIT) + RESET_MARGIN)
        }
    }

    async fn core_quota_exhausted(&self) -> bool {
        match self.platform.rate_limit().await {
            Ok(limits) => limits.resources.core.remaining == 0,
            Err(e) => {
                debug!("Failed to read rate limits: {e}; assuming the global quota is exhausted");
                true
            }
        }
    }

    /// Run `op` until it succeeds or fails in a way that should not be retried.
    pub async fn retry<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        loop {
            let err = match op().await {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };
            match self.classify(&err).await {
                Retry::After(wait) => {
                    info!("{err}; retrying in {}s", wait.as_secs());
                    tokio::time::sleep(wait).await;
                }
                Retry::GiveUp => return Err(err),
            }
        }
    }

    /// List every item of `listing`, following pagination, up to `cap` items if given.
    ///
    /// A page that fails ends the listing; the items of the pages before it are kept.
    pub async fn list_all<T: DeserializeOwned>(&self, listing: &Listing, cap: Option<usize>) -> Partial<T> {
        self.list_all_counted(listing, cap).await.0
    }

    /// Like `list_all`, also returning the total match count that search listings report.
    pub async fn list_all_counted<T: DeserializeOwned>(
        &self,
        listing: &Listing,
        cap: Option<usize>,
    ) -> (Partial<T>, Option<u64>) {
        let mut items = Vec::new();
        let mut halted = None;
        let mut total_count = None;
        let mut cursor: Option<Url> = None;
        let mut num_pages = 0usize;

        loop {
            let page: Page<T> = match self
                .retry(|| self.platform.fetch_page(listing, cursor.as_ref()))
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    debug!("Listing {listing} failed after {num_pages} pages: {e}");
                    halted = Some(e);
                    break;
                }
            };
            num_pages += 1;
            total_count = total_count.or(page.total_count);
            items.extend(page.items);

            if let Some(cap) = cap {
                if items.len() >= cap {
                    items.truncate(cap);
                    break;
                }
            }
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!("Listed {} items from {num_pages} pages of {listing}", items.len());
        let partial = Partial {
            items,
            errors: Vec::new(),
            halted,
        };
        (partial, total_count)
    }

    /// Approximate the complete results of a search that may exceed the search result window.
    ///
    /// The search is repeated with each of `sorts` in descending and ascending order, and items are
    /// deduplicated by `key`. `None` is best-match, which has no order and is queried once.
    /// Repetition stops at the first query whose total fits in the window, or at the first query
    /// that fails.
    pub async fn search_exhaustively<T, K, F>(
        &self,
        listing: &Listing,
        sorts: &[Option<&str>],
        key: F,
    ) -> Partial<T>
    where
        T: DeserializeOwned,
        K: Eq + Hash,
        F: Fn(&T) -> K,
    {
        let mut seen = HashSet::new();
        let mut results = Partial::default();

        'queries: for sort in sorts {
            let orders = if sort.is_some() { &SEARCH_ORDERS[..] } else { &SEARCH_ORDERS[..1] };
            for order in orders {
                let query = listing.reordered(*sort, order);
                let (partial, total) = self.list_all_counted::<T>(&query, None).await;
                for item in partial.items {
                    if seen.insert(key(&item)) {
                        results.items.push(item);
                    }
                }
                if partial.halted.is_some() {
                    results.halted = partial.halted;
                    break 'queries;
                }
                if total.unwrap_or(0) <= SEARCH_RESULT_WINDOW {
                    break 'queries;
                }
                debug!("{query} reports {total:?} results; trying another ordering");
            }
        }

        results
    }

    /// Run `op` once per input, stopping early once the global quota is exhausted.
    ///
    /// The quota gate is checked before each call. Errors other than a global rate limit are
    /// collected and the loop continues.
    pub async fn for_each_until_exhausted<I, T, F, Fut>(&self, inputs: I, mut op: F) -> Partial<T>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut partial = Partial::default();
        for input in inputs {
            if self.is_global_rate_limit_exceeded() {
                debug!("Global rate limit exceeded; not issuing further calls");
                break;
            }
            match op(input).await {
                Ok(v) => partial.items.push(v),
                Err(e) if e.is_rate_limited() && self.is_global_rate_limit_exceeded() => {
                    partial.halted = Some(e);
                    break;
                }
                Err(e) => partial.errors.push(e),
            }
        }
        partial
    }
}
