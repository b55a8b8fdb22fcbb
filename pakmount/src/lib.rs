//! pakmount - one namespace over many PAK archives.
//!
//! Archives are mounted with a priority rank; when several contain the same
//! path, the highest rank wins and ties go to the most recently mounted.
//! Decoding runs on a bounded [`pool::WorkerPool`] with a per-task timeout,
//! and decoded results are kept in a fingerprint-keyed
//! [`cache::ContentCache`].
//!
//! # Example
//!
//! ```
//! use pakmount::archive::PakWriter;
//! use pakmount::overlay::MountRequest;
//! use pakmount::vfs::VfsBuilder;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let base = PakWriter::new().add("x.txt", "A").finish().unwrap();
//! let patch = PakWriter::new().add("x.txt", "B").finish().unwrap();
//!
//! let vfs = VfsBuilder::new().without_pool().build().await.unwrap();
//! vfs.mount(MountRequest::new("pak0.pak", base).with_priority(0)).await.unwrap();
//! vfs.mount(MountRequest::new("pak1.pak", patch).with_priority(10)).await.unwrap();
//!
//! assert_eq!(&vfs.read("x.txt").unwrap()[..], b"B");
//! # });
//! ```

pub mod archive;
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod overlay;
pub mod pool;
pub mod store;
pub mod vfs;

pub use error::{VfsError, VfsResult};
pub use fingerprint::ContentFingerprint;
pub use vfs::{ArchiveVfs, VfsBuilder};

/// Version of the pakmount library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
