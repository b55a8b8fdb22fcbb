//! The application-facing VFS.
//!
//! [`ArchiveVfs`] ties the pieces together:
//!
//! ```text
//! mount(bytes) ─► fingerprint ─► pak-index cache ─► pool: ArchiveIndex ─► registry ─► rebuild
//! parse(path)  ─► overlay ─► asset cache ─► pool: AssetDecode ─► cache set
//!                                             └─ on failure: local decode
//! ```
//!
//! Construct it with [`VfsBuilder`]; tear it down with
//! [`ArchiveVfs::shutdown`].

mod builder;
mod context;

pub use builder::VfsBuilder;
pub use context::{ArchiveVfs, FileMetadata};
