//! Archive decoding.
//!
//! An [`ArchiveCodec`] reads an archive's directory and produces an
//! [`ArchiveIndex`]: the list of member paths with their byte ranges. Member
//! bytes are never copied; readers slice the mounted archive buffer.
//!
//! The built-in codec is [`PakCodec`] for Quake II `.pak` files.

mod index;
mod pak;

pub use index::{normalize_path, ArchiveEntry, ArchiveIndex};
pub use pak::{PakCodec, PakWriter, PAK_DIR_ENTRY_LEN, PAK_HEADER_LEN, PAK_NAME_LEN};

use crate::codec::DecodeError;

/// Decodes an archive directory.
///
/// Implementations must be thread-safe; indexing runs on worker threads.
pub trait ArchiveCodec: Send + Sync {
    /// Produce the member index of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the bytes are not a valid archive.
    fn index(&self, bytes: &[u8]) -> Result<ArchiveIndex, DecodeError>;
}
