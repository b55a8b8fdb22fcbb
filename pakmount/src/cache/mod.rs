//! Content-addressed cache.
//!
//! Two layers:
//! - [`Cache`]: generic byte store implemented by providers
//!   ([`MemoryCacheProvider`], [`DiskCacheProvider`])
//! - [`ContentCache`]: namespaced, typed client used by the VFS
//!
//! Keys embed a [`ContentFingerprint`](crate::fingerprint::ContentFingerprint),
//! so entries are written once and never invalidated. Nothing here evicts;
//! capacity is the backing store's concern.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use pakmount::cache::{CacheNamespace, ContentCache, MemoryCacheProvider};
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! rt.block_on(async {
//!     let cache = ContentCache::new(Arc::new(MemoryCacheProvider::new()));
//!     cache.set(CacheNamespace::ArchiveIndex, "abc", vec![1, 2]).await;
//!     assert_eq!(cache.get(CacheNamespace::ArchiveIndex, "abc").await, Some(vec![1, 2]));
//! });
//! ```

mod content;
pub mod providers;
mod traits;

pub use content::{CacheNamespace, CacheStats, ContentCache};
pub use providers::{DiskCacheProvider, MemoryCacheProvider};
pub use traits::{BoxFuture, Cache, CacheError};
