//! Core traits for the content cache.
//!
//! The `Cache` trait is a plain key-value interface over string keys and
//! byte values. Providers implement it; [`ContentCache`](super::ContentCache)
//! layers namespaces and typed values on top.
//!
//! Providers never evict on their own. Keys are derived from content
//! fingerprints, so an entry stays valid until the backing store is cleared.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error in a disk-backed provider.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be (de)serialised.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Key cannot be represented by the provider.
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),
}

impl From<bincode::Error> for CacheError {
    fn from(e: bincode::Error) -> Self {
        CacheError::Serialization(e.to_string())
    }
}

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Generic key-value cache.
///
/// Uses `Pin<Box<dyn Future>>` for async methods so providers can be held as
/// `Arc<dyn Cache>`.
pub trait Cache: Send + Sync {
    /// Store a value, replacing any previous value for `key`.
    fn set(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, Result<(), CacheError>>;

    /// Retrieve a value.
    ///
    /// Returns `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, CacheError>>;

    /// Delete a value. Returns whether the key existed.
    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, CacheError>>;

    /// Check if a key exists without retrieving the value.
    fn contains(&self, key: &str) -> BoxFuture<'_, Result<bool, CacheError>>;

    /// Remove every entry.
    fn clear(&self) -> BoxFuture<'_, Result<(), CacheError>>;

    /// Total stored bytes (approximate for memory providers).
    fn size_bytes(&self) -> u64;

    /// Number of stored entries.
    fn entry_count(&self) -> u64;

    /// Short provider name for logs and stats output.
    fn name(&self) -> &'static str;
}
