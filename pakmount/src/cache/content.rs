//! Namespaced content cache client.
//!
//! Wraps a generic [`Cache`] with:
//! - Key translation: `(namespace, key)` → `"{namespace}:{key}"`
//! - Typed values via bincode
//! - Hit/miss counters
//!
//! Lookups never fail. A provider error is logged and reported as a miss,
//! so callers always have the option of recomputing the value.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::traits::{Cache, CacheError};
use crate::fingerprint::ContentFingerprint;

/// Cache namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    /// Decoded archive directories, keyed by archive fingerprint.
    ArchiveIndex,
    /// Decoded assets, keyed by `"{fingerprint}:{path}"`.
    ParsedAsset,
}

impl CacheNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheNamespace::ArchiveIndex => "pak-index",
            CacheNamespace::ParsedAsset => "asset",
        }
    }
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of cache activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub backend: &'static str,
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub errors: u64,
    pub entries: u64,
    pub size_bytes: u64,
}

impl CacheStats {
    /// Hit ratio in `[0, 1]`; zero when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cache: {} entries, {} bytes, {} hits, {} misses ({:.1}% hit rate)",
            self.backend,
            self.entries,
            self.size_bytes,
            self.hits,
            self.misses,
            self.hit_rate() * 100.0
        )
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    errors: AtomicU64,
}

/// Content-addressed cache shared by the mount and parse paths.
///
/// Cloning is cheap; clones share the provider and the counters.
#[derive(Clone)]
pub struct ContentCache {
    cache: Arc<dyn Cache>,
    counters: Arc<Counters>,
}

impl ContentCache {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self {
            cache,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Key for a decoded asset: `"{fingerprint}:{path}"`.
    pub fn asset_key(fingerprint: &ContentFingerprint, path: &str) -> String {
        format!("{}:{}", fingerprint, path)
    }

    fn full_key(namespace: CacheNamespace, key: &str) -> String {
        format!("{}:{}", namespace.as_str(), key)
    }

    /// Look up raw bytes. Returns `None` on a miss or a provider error.
    pub async fn get(&self, namespace: CacheNamespace, key: &str) -> Option<Vec<u8>> {
        let full = Self::full_key(namespace, key);
        match self.cache.get(&full).await {
            Ok(Some(data)) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!(namespace = %namespace, key = %key, "Cache hit");
                Some(data)
            }
            Ok(None) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                debug!(namespace = %namespace, key = %key, "Cache miss");
                None
            }
            Err(e) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, key = %full, "Content cache get failed");
                None
            }
        }
    }

    /// Store raw bytes. Failures are logged and otherwise ignored.
    pub async fn set(&self, namespace: CacheNamespace, key: &str, value: Vec<u8>) {
        let full = Self::full_key(namespace, key);
        match self.cache.set(&full, value).await {
            Ok(()) => {
                self.counters.writes.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, key = %full, "Content cache set failed");
            }
        }
    }

    /// Look up and deserialise a value.
    ///
    /// An entry that fails to deserialise is treated as a miss and removed.
    pub async fn get_value<T: DeserializeOwned>(
        &self,
        namespace: CacheNamespace,
        key: &str,
    ) -> Option<T> {
        let data = self.get(namespace, key).await?;
        match bincode::deserialize(&data) {
            Ok(value) => Some(value),
            Err(e) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                warn!(
                    error = %e,
                    namespace = %namespace,
                    key = %key,
                    "Discarding undecodable cache entry"
                );
                let _ = self.cache.delete(&Self::full_key(namespace, key)).await;
                None
            }
        }
    }

    /// Serialise and store a value.
    pub async fn set_value<T: Serialize>(&self, namespace: CacheNamespace, key: &str, value: &T) {
        match bincode::serialize(value) {
            Ok(data) => self.set(namespace, key, data).await,
            Err(e) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, namespace = %namespace, key = %key, "Cache value not serialisable");
            }
        }
    }

    pub async fn contains(&self, namespace: CacheNamespace, key: &str) -> bool {
        self.cache
            .contains(&Self::full_key(namespace, key))
            .await
            .unwrap_or(false)
    }

    /// Drop every entry in the underlying provider.
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.cache.clear().await
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            backend: self.cache.name(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
            entries: self.cache.entry_count(),
            size_bytes: self.cache.size_bytes(),
        }
    }
}

impl fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentCache")
            .field("backend", &self.cache.name())
            .finish()
    }
}
