//! Cache provider implementations.
//!
//! - [`MemoryCacheProvider`]: in-process map using moka, no eviction
//! - [`DiskCacheProvider`]: one file per entry under a directory

mod disk;
mod memory;

pub use disk::DiskCacheProvider;
pub use memory::MemoryCacheProvider;
