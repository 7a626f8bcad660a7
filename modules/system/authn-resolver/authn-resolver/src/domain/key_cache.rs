//! Multi-endpoint JWKS cache.
//!
//! Each endpoint owns one [`KeySet`] behind its own read-write lock, so
//! lookups against one issuer never contend with a refresh of another.
//! Fetches always run outside any lock; only the final install takes the
//! write side.
//!
//! ```ignore
//! let cache = Arc::new(JwkCache::new(fetcher, Duration::from_secs(10)));
//! cache.load_all_endpoints(&endpoints).await;
//! cache.refresh_endpoints(endpoints, Duration::from_secs(86_400));
//!
//! let jwk = cache.get("https://idp.example/keys", "kid-1").await?;
//! ```

use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::fetcher::JwksFetcher;
use crate::error::KeyCacheError;

/// Keys published by one endpoint, as of the last successful fetch.
#[derive(Debug, Clone)]
pub struct KeySet {
    keys: Vec<Jwk>,
    fetched_at: SystemTime,
}

impl KeySet {
    #[must_use]
    pub fn new(set: JwkSet) -> Self {
        Self {
            keys: set.keys,
            fetched_at: SystemTime::now(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub fn fetched_at(&self) -> SystemTime {
        self.fetched_at
    }

    /// Find the single key carrying `kid`.
    ///
    /// `Ok(None)` means no key matched.
    ///
    /// # Errors
    ///
    /// Returns `AmbiguousKey` if more than one key carries `kid`.
    pub fn find(&self, endpoint: &str, kid: &str) -> Result<Option<Jwk>, KeyCacheError> {
        let mut matches = self
            .keys
            .iter()
            .filter(|k| k.common.key_id.as_deref() == Some(kid));

        let Some(first) = matches.next() else {
            return Ok(None);
        };
        let extra = matches.count();
        if extra > 0 {
            return Err(KeyCacheError::AmbiguousKey {
                endpoint: endpoint.to_owned(),
                kid: kid.to_owned(),
                count: extra + 1,
            });
        }
        Ok(Some(first.clone()))
    }
}

type Entries = DashMap<String, Arc<RwLock<KeySet>>>;

/// Shared cache of signing keys, keyed by JWKS endpoint.
pub struct JwkCache {
    fetcher: Arc<dyn JwksFetcher>,
    entries: Entries,
    fetch_timeout: Duration,
    cancel_token: CancellationToken,
    refresh_handle: Mutex<Option<JoinHandle<()>>>,
}

impl JwkCache {
    #[must_use]
    pub fn new(fetcher: Arc<dyn JwksFetcher>, fetch_timeout: Duration) -> Self {
        Self {
            fetcher,
            entries: DashMap::new(),
            fetch_timeout,
            cancel_token: CancellationToken::new(),
            refresh_handle: Mutex::new(None),
        }
    }

    /// Resolve the key `kid` published by `endpoint`.
    ///
    /// A loaded endpoint that lacks `kid` is re-fetched once before giving up,
    /// which picks up rotated keys without waiting for the periodic refresh.
    ///
    /// # Errors
    ///
    /// - `EndpointNotCached` if `endpoint` was never loaded
    /// - `KeyNotFound` if `kid` is still missing after the re-fetch
    /// - `AmbiguousKey` if several keys share `kid`
    /// - `Fetch` / `FetchTimeout` / `InvalidKeySet` if the re-fetch fails
    pub async fn get(&self, endpoint: &str, kid: &str) -> Result<Jwk, KeyCacheError> {
        let entry = self
            .entry(endpoint)
            .ok_or_else(|| KeyCacheError::EndpointNotCached {
                endpoint: endpoint.to_owned(),
            })?;

        let cached = entry.read().find(endpoint, kid)?;
        if let Some(jwk) = cached {
            return Ok(jwk);
        }

        debug!(endpoint, kid, "key id not in cached set, re-fetching");
        let fresh = self.fetch(endpoint).await?;
        let found = fresh.find(endpoint, kid);
        self.install(endpoint, fresh);

        found?.ok_or_else(|| KeyCacheError::KeyNotFound {
            endpoint: endpoint.to_owned(),
            kid: kid.to_owned(),
        })
    }

    /// Fetch and install the key set of a single endpoint.
    ///
    /// Returns the number of keys installed.
    ///
    /// # Errors
    ///
    /// Returns the fetch error; any previously cached set is left in place.
    pub async fn load_endpoint(&self, endpoint: &str) -> Result<usize, KeyCacheError> {
        let set = self.fetch(endpoint).await?;
        let count = set.len();
        self.install(endpoint, set);
        Ok(count)
    }

    /// Fetch and install the key set of every endpoint.
    ///
    /// Failures are logged and leave that endpoint unloaded; a later refresh
    /// installs it. Returns the number of endpoints loaded.
    pub async fn load_all_endpoints(&self, endpoints: &[String]) -> usize {
        let mut loaded = 0;
        for endpoint in endpoints {
            match self.load_endpoint(endpoint).await {
                Ok(keys) => {
                    info!(endpoint = %endpoint, keys, "loaded key set");
                    loaded += 1;
                }
                Err(e) => error!(endpoint = %endpoint, error = %e, "failed to load key set"),
            }
        }
        loaded
    }

    /// Re-fetch every endpoint once, replacing a set only on success.
    pub async fn refresh_once(&self, endpoints: &[String]) {
        for endpoint in endpoints {
            match self.fetch(endpoint).await {
                Ok(set) => {
                    info!(endpoint = %endpoint, keys = set.len(), "refreshed key set");
                    self.install(endpoint, set);
                }
                Err(e) => error!(
                    endpoint = %endpoint,
                    error = %e,
                    "key set refresh failed, keeping last known keys"
                ),
            }
        }
    }

    /// Start the background task that refreshes `endpoints` every `interval`.
    ///
    /// The first refresh happens one full interval after the call. Calling this
    /// again replaces the running task. A zero `interval` starts nothing.
    ///
    /// # Panics
    ///
    /// Must be called within a Tokio runtime context.
    pub fn refresh_endpoints(self: &Arc<Self>, endpoints: Vec<String>, interval: Duration) {
        if interval.is_zero() {
            error!("key set refresh interval is zero; background refresh disabled");
            return;
        }
        let cache: Weak<Self> = Arc::downgrade(self);
        let token = self.cancel_token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = token.cancelled() => {
                        info!("key set refresh task shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let Some(cache) = cache.upgrade() else { break };
                        cache.refresh_once(&endpoints).await;
                    }
                }
            }
        });

        if let Some(previous) = self.refresh_handle.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Stop the background refresh task and wait for it to finish.
    pub async fn shutdown(&self) {
        self.cancel_token.cancel();
        let handle = self.refresh_handle.lock().take();
        if let Some(handle) = handle
            && let Err(err) = handle.await
            && !err.is_cancelled()
        {
            warn!(error = %err, "key set refresh task panicked");
        }
    }

    #[must_use]
    pub fn is_loaded(&self, endpoint: &str) -> bool {
        self.entries.contains_key(endpoint)
    }

    #[must_use]
    pub fn key_count(&self, endpoint: &str) -> Option<usize> {
        self.entry(endpoint).map(|e| e.read().len())
    }

    #[must_use]
    pub fn fetched_at(&self, endpoint: &str) -> Option<SystemTime> {
        self.entry(endpoint).map(|e| e.read().fetched_at())
    }

    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    fn entry(&self, endpoint: &str) -> Option<Arc<RwLock<KeySet>>> {
        self.entries.get(endpoint).map(|e| Arc::clone(e.value()))
    }

    #[tracing::instrument(skip_all, fields(endpoint = %endpoint))]
    async fn fetch(&self, endpoint: &str) -> Result<KeySet, KeyCacheError> {
        let set = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(endpoint))
            .await
            .map_err(|_| KeyCacheError::FetchTimeout {
                endpoint: endpoint.to_owned(),
            })??;
        Ok(KeySet::new(set))
    }

    fn install(&self, endpoint: &str, set: KeySet) {
        match self.entries.entry(endpoint.to_owned()) {
            Entry::Occupied(existing) => *existing.get().write() = set,
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(RwLock::new(set)));
            }
        }
    }
}

impl Drop for JwkCache {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
