//! Read-through query cache with in-flight dedup and staleness tracking.
//!
//! Entries live behind a single mutex keyed by [`QueryKey`]. A read either
//! hits a fresh value, joins the fetch already running for the key, or
//! becomes the leader that performs it; concurrent identical reads always
//! collapse into one underlying fetch. Invalidation marks entries stale:
//! observed keys refetch in the background, unobserved ones are dropped
//! and refetched by whoever asks next.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::broadcast;

use crate::api::{ApiError, QueryFetcher};
use crate::keys::{QueryKey, Scope};

/// Snapshot of one entry, for observers that render loading and error
/// affordances.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyState {
    pub value: Option<Value>,
    pub stale: bool,
    pub loading: bool,
    pub error: Option<ApiError>,
}

#[derive(Default)]
struct Entry {
    value: Option<Value>,
    stale: bool,
    observers: usize,
    error: Option<ApiError>,
    /// Bumped on every invalidation; a fetch that started before the bump
    /// lands with its value already stale.
    epoch: u64,
    inflight: Option<broadcast::Sender<Result<Value, ApiError>>>,
}

struct CacheInner {
    fetcher: Arc<dyn QueryFetcher>,
    entries: Mutex<HashMap<QueryKey, Entry>>,
}

/// Shared query cache handle; cloning shares the underlying entries.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

enum Plan {
    Hit(Value),
    Join(broadcast::Receiver<Result<Value, ApiError>>),
    Lead(u64),
}

impl QueryCache {
    pub fn new(fetcher: Arc<dyn QueryFetcher>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                fetcher,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the value behind `key`, fetching it if the cache holds no
    /// fresh copy.
    ///
    /// Concurrent callers for the same key share one fetch; every caller
    /// observes that fetch's result. A fetched value is stored verbatim;
    /// nothing is ever patched into it.
    pub async fn read(&self, key: QueryKey) -> Result<Value, ApiError> {
        loop {
            let plan = {
                let mut entries = self.entries();
                let entry = entries.entry(key).or_default();
                if let Some(value) = entry.value.clone().filter(|_| !entry.stale) {
                    Plan::Hit(value)
                } else if let Some(tx) = &entry.inflight {
                    Plan::Join(tx.subscribe())
                } else {
                    let (tx, _) = broadcast::channel(1);
                    entry.inflight = Some(tx);
                    Plan::Lead(entry.epoch)
                }
            };

            match plan {
                Plan::Hit(value) => return Ok(value),
                Plan::Join(mut rx) => match rx.recv().await {
                    Ok(result) => return result,
                    // The leading task was cancelled before it could report;
                    // re-examine the entry and join or lead as it stands now.
                    Err(_) => continue,
                },
                Plan::Lead(started_epoch) => return self.lead(key, started_epoch).await,
            }
        }
    }

    async fn lead(&self, key: QueryKey, started_epoch: u64) -> Result<Value, ApiError> {
        // If this future is dropped mid-fetch, the guard closes the in-flight
        // channel so joined readers wake and elect a new leader instead of
        // waiting on a fetch nobody is driving.
        let mut guard = LeadGuard {
            cache: self,
            key,
            armed: true,
        };
        let result = self.inner.fetcher.fetch(key).await;

        let mut entries = self.entries();
        let entry = entries.entry(key).or_default();
        let tx = entry.inflight.take();
        match &result {
            Ok(value) => {
                entry.value = Some(value.clone());
                // A fetch that raced an invalidation lands stale; the next
                // read refreshes it.
                entry.stale = entry.epoch != started_epoch;
                entry.error = None;
            }
            Err(err) => {
                entry.error = Some(err.clone());
            }
        }
        // Joiners subscribe under the same lock, so sending here reaches
        // every one of them.
        if let Some(tx) = tx {
            let _ = tx.send(result.clone());
        }
        drop(entries);
        guard.armed = false;

        result
    }

    /// Marks the given keys stale. A `List` key reaches its whole resource
    /// family, entity entries included. Observed entries refetch in the
    /// background through the dedup path; unobserved idle entries are
    /// dropped so the next read refetches.
    pub fn invalidate(&self, keys: &[QueryKey]) {
        let mut refetch = Vec::new();
        {
            let mut entries = self.entries();
            let mut dropped = Vec::new();
            for key in keys {
                match key.scope {
                    Scope::List => {
                        for (k, entry) in entries
                            .iter_mut()
                            .filter(|(k, _)| k.resource == key.resource)
                        {
                            mark_stale(*k, entry, &mut refetch, &mut dropped);
                        }
                    }
                    Scope::Entity(_) => {
                        if let Some(entry) = entries.get_mut(key) {
                            mark_stale(*key, entry, &mut refetch, &mut dropped);
                        }
                    }
                }
            }
            for key in dropped {
                entries.remove(&key);
            }
        }

        for key in refetch {
            let cache = self.clone();
            tokio::spawn(async move {
                if let Err(error) = cache.read(key).await {
                    tracing::debug!(key = %key, error = %error, "background refetch failed");
                }
            });
        }
    }

    /// Forces the next value for `key` to come from the fetcher.
    pub async fn refresh(&self, key: QueryKey) -> Result<Value, ApiError> {
        {
            let mut entries = self.entries();
            if let Some(entry) = entries.get_mut(&key) {
                entry.stale = true;
                entry.epoch += 1;
            }
        }
        self.read(key).await
    }

    /// Declares a UI-facing dependency on `key`.
    pub fn observe(&self, key: QueryKey) {
        self.entries().entry(key).or_default().observers += 1;
    }

    /// Releases one [`observe`](Self::observe) registration.
    pub fn release(&self, key: QueryKey) {
        if let Some(entry) = self.entries().get_mut(&key) {
            entry.observers = entry.observers.saturating_sub(1);
        }
    }

    /// Current state of `key`, or `None` if nothing is cached for it.
    pub fn state(&self, key: QueryKey) -> Option<KeyState> {
        self.entries().get(&key).map(|entry| KeyState {
            value: entry.value.clone(),
            stale: entry.stale,
            loading: entry.inflight.is_some(),
            error: entry.error.clone(),
        })
    }
}

/// Releases leadership of an in-flight fetch if the leading future never
/// finishes. Dropping the stored sender closes the channel, which is what
/// joined readers interpret as "leader gone".
struct LeadGuard<'a> {
    cache: &'a QueryCache,
    key: QueryKey,
    armed: bool,
}

impl Drop for LeadGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Some(entry) = self.cache.entries().get_mut(&self.key) {
                entry.inflight = None;
            }
        }
    }
}

fn mark_stale(
    key: QueryKey,
    entry: &mut Entry,
    refetch: &mut Vec<QueryKey>,
    dropped: &mut Vec<QueryKey>,
) {
    entry.epoch += 1;
    entry.stale = true;
    if entry.inflight.is_some() {
        // The running fetch lands stale via the epoch bump; no extra work.
        return;
    }
    if entry.observers > 0 {
        refetch.push(key);
    } else {
        dropped.push(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Resource;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    /// Counts fetches; optionally parks them on a semaphore until the test
    /// releases them.
    struct CountingFetcher {
        calls: AtomicUsize,
        gate: Option<Semaphore>,
        fail_first: AtomicUsize,
    }

    impl CountingFetcher {
        fn free() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: None,
                fail_first: AtomicUsize::new(0),
            })
        }

        fn gated() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: Some(Semaphore::new(0)),
                fail_first: AtomicUsize::new(0),
            })
        }

        fn failing(times: usize) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: None,
                fail_first: AtomicUsize::new(times),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn release(&self, n: usize) {
            if let Some(gate) = &self.gate {
                gate.add_permits(n);
            }
        }
    }

    #[async_trait]
    impl QueryFetcher for CountingFetcher {
        async fn fetch(&self, key: QueryKey) -> Result<Value, ApiError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await;
            }
            if call <= self.fail_first.load(Ordering::SeqCst) {
                return Err(ApiError::Server("boom".into()));
            }
            Ok(json!({ "key": key.to_string(), "call": call }))
        }
    }

    #[tokio::test]
    async fn read_fetches_once_then_hits() {
        let fetcher = CountingFetcher::free();
        let cache = QueryCache::new(fetcher.clone());
        let key = QueryKey::list(Resource::Call);

        let first = cache.read(key).await.unwrap();
        let second = cache.read(key).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(fetcher.calls(), 1);

        cache.read(QueryKey::list(Resource::Tag)).await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn ten_concurrent_readers_share_one_fetch() {
        let fetcher = CountingFetcher::gated();
        let cache = QueryCache::new(fetcher.clone());
        let key = QueryKey::entity(Resource::CallTask, 7);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.read(key).await }));
        }
        // Current-thread runtime: one yield drives every reader to its
        // await point, so all ten are parked on the single fetch.
        tokio::task::yield_now().await;
        assert_eq!(fetcher.calls(), 1);
        assert!(cache.state(key).is_some_and(|s| s.loading));

        fetcher.release(1);
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }
        assert_eq!(fetcher.calls(), 1);
        assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[tokio::test]
    async fn cancelled_leader_hands_off_to_the_next_reader() {
        let fetcher = CountingFetcher::gated();
        let cache = QueryCache::new(fetcher.clone());
        let key = QueryKey::list(Resource::Call);

        let leader = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.read(key).await })
        };
        let joiner = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.read(key).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(fetcher.calls(), 1);

        // Killing the leader mid-fetch must not strand the joined reader.
        leader.abort();
        fetcher.release(2);

        let value = joiner.await.unwrap().unwrap();
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(value["call"], 2);
    }

    #[tokio::test]
    async fn invalidating_observed_key_refetches_in_background() {
        let fetcher = CountingFetcher::free();
        let cache = QueryCache::new(fetcher.clone());
        let key = QueryKey::list(Resource::Tag);

        cache.observe(key);
        cache.read(key).await.unwrap();
        assert_eq!(fetcher.calls(), 1);

        cache.invalidate(&[key]);
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert_eq!(fetcher.calls(), 2);
        let state = cache.state(key).unwrap();
        assert!(!state.stale);
        assert!(state.value.is_some());
    }

    #[tokio::test]
    async fn invalidating_unobserved_key_drops_the_entry() {
        let fetcher = CountingFetcher::free();
        let cache = QueryCache::new(fetcher.clone());
        let key = QueryKey::entity(Resource::Call, 5);

        cache.read(key).await.unwrap();
        cache.invalidate(&[key]);

        assert!(cache.state(key).is_none());
        assert_eq!(fetcher.calls(), 1);

        cache.read(key).await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn list_invalidation_reaches_the_whole_family() {
        let fetcher = CountingFetcher::free();
        let cache = QueryCache::new(fetcher.clone());
        let one = QueryKey::entity(Resource::Tag, 1);
        let two = QueryKey::entity(Resource::Tag, 2);
        let list = QueryKey::list(Resource::Tag);
        let other = QueryKey::list(Resource::Call);

        for key in [one, two, list, other] {
            cache.read(key).await.unwrap();
        }

        cache.invalidate(&[list]);
        assert!(cache.state(one).is_none());
        assert!(cache.state(two).is_none());
        assert!(cache.state(list).is_none());
        assert!(cache.state(other).is_some_and(|s| !s.stale));
    }

    #[tokio::test]
    async fn fetch_error_is_surfaced_and_next_read_retries() {
        let fetcher = CountingFetcher::failing(1);
        let cache = QueryCache::new(fetcher.clone());
        let key = QueryKey::list(Resource::Task);

        let err = cache.read(key).await.unwrap_err();
        assert_eq!(err, ApiError::Server("boom".into()));
        let state = cache.state(key).unwrap();
        assert!(state.value.is_none());
        assert_eq!(state.error, Some(err));

        cache.read(key).await.unwrap();
        assert_eq!(fetcher.calls(), 2);
        assert!(cache.state(key).is_some_and(|s| s.error.is_none()));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_the_previous_value() {
        let fetcher = CountingFetcher::free();
        let cache = QueryCache::new(fetcher.clone());
        let key = QueryKey::entity(Resource::Task, 2);

        let value = cache.read(key).await.unwrap();
        fetcher.fail_first.store(usize::MAX, Ordering::SeqCst);

        cache.refresh(key).await.unwrap_err();
        let state = cache.state(key).unwrap();
        assert_eq!(state.value, Some(value));
        assert!(state.stale);
        assert!(state.error.is_some());
    }

    #[tokio::test]
    async fn value_landing_after_invalidation_stays_stale() {
        let fetcher = CountingFetcher::gated();
        let cache = QueryCache::new(fetcher.clone());
        let key = QueryKey::entity(Resource::CallTag, 3);

        let reader = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.read(key).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(fetcher.calls(), 1);

        // Invalidation lands while the fetch is parked on the gate.
        cache.invalidate(&[key]);
        fetcher.release(1);

        reader.await.unwrap().unwrap();
        let state = cache.state(key).unwrap();
        assert!(state.stale);
        assert!(state.value.is_some());
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn release_returns_key_to_lazy_invalidation() {
        let fetcher = CountingFetcher::free();
        let cache = QueryCache::new(fetcher.clone());
        let key = QueryKey::list(Resource::SuggestedTask);

        cache.observe(key);
        cache.read(key).await.unwrap();
        cache.release(key);

        cache.invalidate(&[key]);
        assert!(cache.state(key).is_none());
        assert_eq!(fetcher.calls(), 1);
    }
}
