//! Keyed, cache-aware fetching
//!
//! [`QueryClient`] wraps the [`RequestExecutor`] behind a cache keyed by
//! [`QueryKey`]. It is constructed explicitly and threaded down to whoever
//! needs it; clones share one cache.
//!
//! The defaults favour predictability over background churn: results never
//! go stale, nothing refetches on focus, and failed requests are not
//! retried. Concurrent fetches of one key are not coalesced unless
//! [`QueryDefaults::dedupe_in_flight`] is turned on; without it the result
//! that resolves last is the one left in the cache.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use libappcore::endpoint::{EndpointResolver, Platform};
//! use libappcore::http::{client::ReqwestTransport, RequestExecutor};
//! use libappcore::query::{QueryClient, QueryDefaults, QueryKey, UnauthorizedBehavior};
//!
//! # async fn example() -> libappcore::Result<()> {
//! let executor = RequestExecutor::new(Arc::new(ReqwestTransport::new()?));
//! let client = QueryClient::new(
//!     executor,
//!     EndpointResolver::new(Platform::current()),
//!     QueryDefaults::default(),
//! );
//!
//! let key = QueryKey::from("/api/user");
//! match client.fetch_query(&key, UnauthorizedBehavior::ReturnNull).await? {
//!     Some(user) => println!("Signed in as {}", user["name"]),
//!     None => println!("Not signed in"),
//! }
//! # Ok(())
//! # }
//! ```

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::endpoint::EndpointResolver;
use crate::error::{RequestError, Result};
use crate::http::{ensure_success, HttpResponse, Method, RequestExecutor, RequestResult};

/// Ordered path segments identifying one cacheable request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Request path: the segments joined with `/`
    pub fn path(&self) -> String {
        self.0.join("/")
    }

    /// Whether this key's leading segments equal `prefix`'s
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl From<&str> for QueryKey {
    fn from(path: &str) -> Self {
        Self(vec![path.to_string()])
    }
}

impl From<String> for QueryKey {
    fn from(path: String) -> Self {
        Self(vec![path])
    }
}

impl From<Vec<String>> for QueryKey {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl From<Vec<&str>> for QueryKey {
    fn from(segments: Vec<&str>) -> Self {
        Self::new(segments)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// What a query does when the server answers 401
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnauthorizedBehavior {
    /// Resolve to `None`, meaning "not authenticated"
    ReturnNull,
    /// Fail with the classified `401: ...` error
    Throw,
}

impl FromStr for UnauthorizedBehavior {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "returnNull" | "return-null" | "return_null" => Ok(UnauthorizedBehavior::ReturnNull),
            "throw" => Ok(UnauthorizedBehavior::Throw),
            _ => Err(format!(
                "Invalid unauthorized behavior: '{}'. Valid options: returnNull, throw",
                s
            )),
        }
    }
}

impl fmt::Display for UnauthorizedBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnauthorizedBehavior::ReturnNull => write!(f, "returnNull"),
            UnauthorizedBehavior::Throw => write!(f, "throw"),
        }
    }
}

/// Cache-wide policies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDefaults {
    /// Age after which a cached result is refetched; `None` means never
    pub stale_time: Option<Duration>,
    /// Extra attempts for a failed query
    pub retry: u32,
    /// Extra attempts for a failed mutation
    pub mutation_retry: u32,
    /// Share one in-flight request between concurrent fetches of a key
    pub dedupe_in_flight: bool,
    /// Refetch stale results when the host reports a focus event
    pub refetch_on_window_focus: bool,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            stale_time: None,
            retry: 0,
            mutation_retry: 0,
            dedupe_in_flight: false,
            refetch_on_window_focus: false,
        }
    }
}

/// One GET per call, with a fixed unauthorized policy
///
/// This is the uncached building block under [`QueryClient::fetch_query`].
#[derive(Clone)]
pub struct QueryFn {
    executor: RequestExecutor,
    resolver: EndpointResolver,
    on_unauthorized: UnauthorizedBehavior,
}

impl QueryFn {
    pub fn on_unauthorized(&self) -> UnauthorizedBehavior {
        self.on_unauthorized
    }

    /// Fetch `key` and parse the JSON body
    ///
    /// Returns `Ok(None)` for a 401 under [`UnauthorizedBehavior::ReturnNull`]
    /// and for a literal JSON `null` body.
    pub async fn call(&self, key: &QueryKey) -> RequestResult<Option<Value>> {
        self.fetch(key).await.map(Fetched::into_value)
    }

    async fn fetch(&self, key: &QueryKey) -> RequestResult<Fetched> {
        let url = self.resolver.build_resource_url(&key.path());
        let response = self.executor.send(Method::GET, &url, None).await?;

        if response.status == 401 && self.on_unauthorized == UnauthorizedBehavior::ReturnNull {
            tracing::debug!(key = %key, "Unauthorized query resolved to null");
            return Ok(Fetched::Unauthorized);
        }

        let response = ensure_success(response)?;
        Ok(Fetched::Data(response.json()?))
    }
}

/// What a query produced, keeping a swallowed 401 apart from a `null` body
#[derive(Debug, Clone, PartialEq)]
enum Fetched {
    Data(Value),
    Unauthorized,
}

impl Fetched {
    fn into_value(self) -> Option<Value> {
        match self {
            Fetched::Data(value) => non_null(value),
            Fetched::Unauthorized => None,
        }
    }
}

fn non_null(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        value => Some(value),
    }
}

struct CacheEntry {
    value: Value,
    updated_at: Instant,
    /// Policy the value was fetched with; focus refetches reuse it
    policy: UnauthorizedBehavior,
    /// The value stands in for a 401, so it only answers `ReturnNull` callers
    unauthorized: bool,
}

impl CacheEntry {
    fn serves(&self, on_unauthorized: UnauthorizedBehavior) -> bool {
        !self.unauthorized || on_unauthorized == UnauthorizedBehavior::ReturnNull
    }
}

type SharedFetch = Shared<BoxFuture<'static, RequestResult<Fetched>>>;

#[derive(Default)]
struct ClientState {
    cache: RwLock<HashMap<QueryKey, CacheEntry>>,
    in_flight: Mutex<HashMap<(QueryKey, UnauthorizedBehavior), SharedFetch>>,
    /// Bumped by `reset`; results from an older generation are not stored
    generation: AtomicU64,
}

/// Cache-aware fetch facade over the request executor
#[derive(Clone)]
pub struct QueryClient {
    executor: RequestExecutor,
    resolver: EndpointResolver,
    defaults: QueryDefaults,
    state: Arc<ClientState>,
}

impl QueryClient {
    pub fn new(executor: RequestExecutor, resolver: EndpointResolver, defaults: QueryDefaults) -> Self {
        Self {
            executor,
            resolver,
            defaults,
            state: Arc::new(ClientState::default()),
        }
    }

    pub fn defaults(&self) -> &QueryDefaults {
        &self.defaults
    }

    pub fn resolver(&self) -> &EndpointResolver {
        &self.resolver
    }

    /// Build an uncached query function with the given 401 policy
    pub fn query_fn(&self, on_unauthorized: UnauthorizedBehavior) -> QueryFn {
        QueryFn {
            executor: self.executor.clone(),
            resolver: self.resolver.clone(),
            on_unauthorized,
        }
    }

    /// Return the cached result for `key` while fresh, otherwise fetch it
    ///
    /// `None` means the server answered 401 under
    /// [`UnauthorizedBehavior::ReturnNull`] (or returned `null`). That
    /// result is cached, but a cached 401 never answers a
    /// [`UnauthorizedBehavior::Throw`] caller: the key is fetched again so
    /// that caller sees the error.
    pub async fn fetch_query(
        &self,
        key: &QueryKey,
        on_unauthorized: UnauthorizedBehavior,
    ) -> Result<Option<Value>> {
        if let Some(value) = self.fresh_value(key, on_unauthorized) {
            tracing::debug!(key = %key, "Query cache hit");
            return Ok(value);
        }
        Ok(self.refetch(key, on_unauthorized).await?)
    }

    /// Typed variant of [`fetch_query`](Self::fetch_query)
    pub async fn fetch_query_as<T: DeserializeOwned>(
        &self,
        key: &QueryKey,
        on_unauthorized: UnauthorizedBehavior,
    ) -> Result<Option<T>> {
        match self.fetch_query(key, on_unauthorized).await? {
            Some(value) => {
                let typed = serde_json::from_value(value)
                    .map_err(|e| RequestError::Decode(e.to_string()))?;
                Ok(Some(typed))
            }
            None => Ok(None),
        }
    }

    /// Fetch `key` from the server regardless of the cache and store the result
    pub async fn refetch(
        &self,
        key: &QueryKey,
        on_unauthorized: UnauthorizedBehavior,
    ) -> RequestResult<Option<Value>> {
        let generation = self.state.generation.load(Ordering::SeqCst);

        let fetched = if self.defaults.dedupe_in_flight {
            self.fetch_shared(key, on_unauthorized).await?
        } else {
            self.fetch_with_retry(key, on_unauthorized).await?
        };

        self.store(key, fetched.clone(), on_unauthorized, generation);
        Ok(fetched.into_value())
    }

    /// Cached value for `key`, fresh or not
    ///
    /// The outer `Option` is whether anything is cached; the inner one is
    /// the cached result itself.
    pub fn get_query_data(&self, key: &QueryKey) -> Option<Option<Value>> {
        self.state
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|entry| non_null(entry.value.clone()))
    }

    /// Overwrite the cached result for `key`
    ///
    /// Focus refetches of a value set this way use
    /// [`UnauthorizedBehavior::Throw`].
    pub fn set_query_data(&self, key: QueryKey, value: Value) {
        self.insert_entry(
            key,
            CacheEntry {
                value,
                updated_at: Instant::now(),
                policy: UnauthorizedBehavior::Throw,
                unauthorized: false,
            },
        );
    }

    /// Drop the cached result for `key`; returns whether one existed
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        self.state
            .cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    /// Drop every cached result whose key starts with `prefix`
    pub fn invalidate_prefix(&self, prefix: &QueryKey) -> usize {
        let mut cache = self.state.cache.write().unwrap_or_else(PoisonError::into_inner);
        let before = cache.len();
        cache.retain(|key, _| !key.starts_with(prefix));
        before - cache.len()
    }

    /// Drop every cached result
    pub fn clear(&self) {
        self.state
            .cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Keys currently holding a cached result
    pub fn cached_keys(&self) -> Vec<QueryKey> {
        self.state
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Uncached request that fails on every non-success status
    ///
    /// The unauthorized policy never applies here: a 401 is always an error.
    pub async fn mutate(&self, method: Method, path: &str, body: Option<Value>) -> Result<HttpResponse> {
        let url = self.resolver.build_resource_url(path);
        let attempts = self.defaults.mutation_retry + 1;

        let mut attempt = 1;
        loop {
            match self.executor.execute(method.clone(), &url, body.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < attempts => {
                    tracing::debug!(%method, url = %url, attempt, error = %e, "Retrying mutation");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Host focus hook
    ///
    /// Refetches stale cached keys when `refetch_on_window_focus` is on and
    /// returns how many were refreshed. Each key is refetched with the 401
    /// policy it was last fetched with. With the default policy nothing is
    /// ever stale and nothing happens.
    pub async fn on_window_focus(&self) -> usize {
        if !self.defaults.refetch_on_window_focus {
            return 0;
        }

        let stale: Vec<(QueryKey, UnauthorizedBehavior)> = {
            let cache = self.state.cache.read().unwrap_or_else(PoisonError::into_inner);
            cache
                .iter()
                .filter(|(_, entry)| self.is_stale(entry))
                .map(|(key, entry)| (key.clone(), entry.policy))
                .collect()
        };

        let mut refreshed = 0;
        for (key, on_unauthorized) in stale {
            match self.refetch(&key, on_unauthorized).await {
                Ok(_) => refreshed += 1,
                Err(e) => tracing::warn!(key = %key, error = %e, "Focus refetch failed"),
            }
        }
        refreshed
    }

    /// Start a new session: clear the cache and disown in-flight requests
    ///
    /// Requests started before the reset still complete for whoever awaits
    /// them, but their results are never written into the new cache.
    pub fn reset(&self) {
        self.state.generation.fetch_add(1, Ordering::SeqCst);
        self.state
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.clear();
        tracing::info!("Query cache reset");
    }

    fn is_stale(&self, entry: &CacheEntry) -> bool {
        match self.defaults.stale_time {
            None => false,
            Some(stale_time) => entry.updated_at.elapsed() >= stale_time,
        }
    }

    fn fresh_value(
        &self,
        key: &QueryKey,
        on_unauthorized: UnauthorizedBehavior,
    ) -> Option<Option<Value>> {
        let cache = self.state.cache.read().unwrap_or_else(PoisonError::into_inner);
        let entry = cache.get(key)?;
        if self.is_stale(entry) || !entry.serves(on_unauthorized) {
            return None;
        }
        Some(non_null(entry.value.clone()))
    }

    fn store(
        &self,
        key: &QueryKey,
        fetched: Fetched,
        on_unauthorized: UnauthorizedBehavior,
        generation: u64,
    ) {
        if self.state.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(key = %key, "Discarding result from a previous session");
            return;
        }
        let unauthorized = fetched == Fetched::Unauthorized;
        self.insert_entry(
            key.clone(),
            CacheEntry {
                value: fetched.into_value().unwrap_or(Value::Null),
                updated_at: Instant::now(),
                policy: on_unauthorized,
                unauthorized,
            },
        );
    }

    fn insert_entry(&self, key: QueryKey, entry: CacheEntry) {
        self.state
            .cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entry);
    }

    async fn fetch_with_retry(
        &self,
        key: &QueryKey,
        on_unauthorized: UnauthorizedBehavior,
    ) -> RequestResult<Fetched> {
        let query_fn = self.query_fn(on_unauthorized);
        let attempts = self.defaults.retry + 1;

        let mut attempt = 1;
        loop {
            match query_fn.fetch(key).await {
                Ok(fetched) => return Ok(fetched),
                Err(e) if attempt < attempts => {
                    tracing::debug!(key = %key, attempt, error = %e, "Retrying query");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_shared(
        &self,
        key: &QueryKey,
        on_unauthorized: UnauthorizedBehavior,
    ) -> RequestResult<Fetched> {
        let slot = (key.clone(), on_unauthorized);

        let shared = {
            let mut in_flight = self
                .state
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            match in_flight.get(&slot) {
                Some(existing) => {
                    tracing::debug!(key = %key, "Joining in-flight query");
                    existing.clone()
                }
                None => {
                    let client = self.clone();
                    let owned_slot = slot.clone();
                    let generation = self.state.generation.load(Ordering::SeqCst);

                    let fetch = async move {
                        let result = client.fetch_with_retry(&owned_slot.0, owned_slot.1).await;
                        if client.state.generation.load(Ordering::SeqCst) == generation {
                            client
                                .state
                                .in_flight
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .remove(&owned_slot);
                        }
                        result
                    }
                    .boxed()
                    .shared();

                    in_flight.insert(slot, fetch.clone());
                    fetch
                }
            }
        };

        shared.await
    }
}
