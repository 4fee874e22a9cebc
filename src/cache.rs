//! Short-TTL observation cache
//!
//! Tiered cache keyed by data kind and 4-decimal rounded coordinates.
//! Expired entries are never served: a read past the expiry deadline
//! deletes the entry and reports a miss. The cache is an optimization,
//! never a correctness dependency - if the underlying store errors, reads
//! degrade to misses and writes are dropped, both with a warning log, so
//! classification and alerting proceed on live fetches.

use crate::config::CacheConfig;
use crate::{Result, StormwatchError};
use fjall::Keyspace;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task;

/// Cached data kinds, each with its own TTL class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    /// Current conditions (5 minutes by default)
    Current,
    /// Hourly/daily forecast (10 minutes by default)
    Forecast,
    /// Area alert markers (1 minute - emergency freshness matters more
    /// than request volume)
    AreaAlerts,
}

impl CacheKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Current => "weather",
            Self::Forecast => "forecast",
            Self::AreaAlerts => "alerts",
        }
    }
}

/// Lookup/hit counters, readable for tests and the heartbeat log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub lookups: u64,
    pub hits: u64,
}

impl CacheStats {
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.lookups - self.hits
    }
}

#[derive(Serialize, Deserialize)]
struct StoredEntry<T> {
    value: T,
    expires_at: u64, // Unix timestamp (seconds)
}

/// Tiered TTL cache over an embedded fjall keyspace
pub struct ObservationCache {
    store: Keyspace,
    current_ttl: Duration,
    forecast_ttl: Duration,
    area_alert_ttl: Duration,
    lookups: AtomicU64,
    hits: AtomicU64,
}

fn get_from_store(store: Keyspace, key: Vec<u8>) -> anyhow::Result<Option<Vec<u8>>> {
    Ok(store.get(key)?.map(|v| v.to_vec()))
}

impl ObservationCache {
    /// Open the cache database at the configured location
    pub fn open(path: impl AsRef<Path>, config: &CacheConfig) -> Result<Self> {
        let db = fjall::Database::builder(&path)
            .open()
            .map_err(|e| StormwatchError::cache(format!("failed to open cache database: {e}")))?;
        let store = db
            .keyspace("observations", fjall::KeyspaceCreateOptions::default)
            .map_err(|e| StormwatchError::cache(format!("failed to open cache keyspace: {e}")))?;

        Ok(Self {
            store,
            current_ttl: Duration::from_secs(config.current_ttl_secs),
            forecast_ttl: Duration::from_secs(config.forecast_ttl_secs),
            area_alert_ttl: Duration::from_secs(config.area_alert_ttl_secs),
            lookups: AtomicU64::new(0),
            hits: AtomicU64::new(0),
        })
    }

    /// TTL for a data kind
    #[must_use]
    pub fn ttl_for(&self, kind: CacheKind) -> Duration {
        match kind {
            CacheKind::Current => self.current_ttl,
            CacheKind::Forecast => self.forecast_ttl,
            CacheKind::AreaAlerts => self.area_alert_ttl,
        }
    }

    /// Store a value under (kind, rounded location) with the kind's TTL.
    /// Always overwrites. Store failures are logged and swallowed.
    pub async fn put<T: Serialize + Send + Debug + 'static>(
        &self,
        kind: CacheKind,
        lat: f64,
        lon: f64,
        value: T,
    ) {
        self.put_with_ttl(kind, lat, lon, value, self.ttl_for(kind)).await;
    }

    /// Store a value with an explicit TTL override
    pub async fn put_with_ttl<T: Serialize + Send + Debug + 'static>(
        &self,
        kind: CacheKind,
        lat: f64,
        lon: f64,
        value: T,
        ttl: Duration,
    ) {
        let key = cache_key(kind, lat, lon);
        if let Err(e) = self.try_put(&key, value, ttl).await {
            tracing::warn!("Cache write for {} dropped: {}", key, e);
        }
    }

    /// Retrieve a value if present and not expired. Misses on expiry and on
    /// any store error; never fails.
    pub async fn get<T: DeserializeOwned + Send + 'static>(
        &self,
        kind: CacheKind,
        lat: f64,
        lon: f64,
    ) -> Option<T> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let key = cache_key(kind, lat, lon);

        match self.try_get(&key).await {
            Ok(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Cache hit for {}", key);
                Some(value)
            }
            Ok(None) => {
                tracing::debug!("Cache miss for {}", key);
                None
            }
            Err(e) => {
                tracing::warn!("Cache read for {} degraded to miss: {}", key, e);
                None
            }
        }
    }

    /// Snapshot of the lookup/hit counters
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            lookups: self.lookups.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
        }
    }

    async fn try_put<T: Serialize + Send + Debug + 'static>(
        &self,
        key: &str,
        value: T,
        ttl: Duration,
    ) -> anyhow::Result<()> {
        let store = self.store.clone();
        let key = key.as_bytes().to_vec();
        let expires_at = SystemTime::now()
            .checked_add(ttl)
            .ok_or_else(|| anyhow::anyhow!("TTL overflow"))?
            .duration_since(UNIX_EPOCH)?
            .as_secs();
        let entry = StoredEntry { value, expires_at };
        let bytes = postcard::to_stdvec(&entry)?;

        let _ = task::spawn_blocking(move || store.insert(key, bytes)).await?;
        Ok(())
    }

    async fn try_get<T: DeserializeOwned + Send + 'static>(
        &self,
        key: &str,
    ) -> anyhow::Result<Option<T>> {
        let store = self.store.clone();
        let key_bytes = key.as_bytes().to_vec();

        let maybe_bytes: Option<Vec<u8>> =
            task::spawn_blocking(move || get_from_store(store, key_bytes)).await??;

        let Some(bytes) = maybe_bytes else {
            return Ok(None);
        };

        let entry: StoredEntry<T> = postcard::from_bytes(&bytes)?;
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

        if now < entry.expires_at {
            Ok(Some(entry.value))
        } else {
            self.remove(key).await?;
            Ok(None)
        }
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        let key = key.as_bytes().to_vec();
        let store = self.store.clone();
        let _ = task::spawn_blocking(move || store.remove(key)).await?;
        Ok(())
    }
}

/// Cache identity uses 4-decimal precision, finer than the 2-decimal
/// grouping key, so nearby-but-distinct monitored points do not share
/// observations.
fn cache_key(kind: CacheKind, lat: f64, lon: f64) -> String {
    format!("{}:{:.4}:{:.4}", kind.prefix(), lat, lon)
}
