//! Asset codecs.
//!
//! A codec turns the raw bytes of one archive member into a typed [`Asset`].
//! The overlay never interprets bytes itself; it hands them to an
//! [`AssetCodec`], either on a worker thread or locally when the worker
//! pool is unavailable.
//!
//! # Example
//!
//! ```
//! use pakmount::codec::{Asset, AssetCodec, QuakeAssetCodec};
//!
//! let codec = QuakeAssetCodec::new();
//! let asset = codec.decode("autoexec.cfg", b"exec default.cfg").unwrap();
//! assert_eq!(asset, Asset::Text("exec default.cfg".to_string()));
//! ```

mod asset;
mod quake;
pub(crate) mod reader;

pub use asset::{
    extension, file_name, Asset, AssetKind, BspMap, Lump, Md2Model, Md3Model, PcxImage,
    SpriteFrame, WalTexture, WavAudio,
};
pub use quake::{pcx_palette, QuakeAssetCodec};

use thiserror::Error;

/// Malformed archive or asset bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Input ended before a structure was complete.
    #[error("Truncated {what}: need {needed} bytes, have {available}")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    /// Leading magic bytes did not match the format.
    #[error("Bad {format} magic: expected {expected:?}, found {found:?}")]
    BadMagic {
        format: &'static str,
        expected: String,
        found: String,
    },

    /// Recognised format, unsupported revision.
    #[error("Unsupported {format} version {version}")]
    UnsupportedVersion { format: &'static str, version: i32 },

    /// Structurally invalid content.
    #[error("Invalid {format}: {reason}")]
    Invalid {
        format: &'static str,
        reason: String,
    },
}

/// Decodes one archive member into an [`Asset`].
///
/// Implementations must be thread-safe: the same codec instance is shared by
/// every worker thread and by the local fallback path.
pub trait AssetCodec: Send + Sync {
    /// Decode `bytes` read from `path`.
    ///
    /// `path` is the normalised overlay path; codecs typically dispatch on
    /// its extension.
    fn decode(&self, path: &str, bytes: &[u8]) -> Result<Asset, DecodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::Truncated {
            what: "PAK header",
            needed: 12,
            available: 4,
        };
        assert_eq!(err.to_string(), "Truncated PAK header: need 12 bytes, have 4");

        let err = DecodeError::UnsupportedVersion {
            format: "BSP",
            version: 46,
        };
        assert!(err.to_string().contains("46"));
    }
}
