//! Cheap content identity for mounted archives.
//!
//! The fingerprint covers a fixed prefix of the archive plus its total
//! length and display name. Two archives that differ only past the prefix
//! and share a length and name collide.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of leading bytes fed into the hash.
pub const FINGERPRINT_PREFIX_LEN: usize = 64 * 1024;

/// Hex-encoded SHA-256 over (prefix, length, name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    /// Fingerprint `bytes` loaded under `display_name`.
    pub fn compute(bytes: &[u8], display_name: &str) -> Self {
        let prefix = &bytes[..bytes.len().min(FINGERPRINT_PREFIX_LEN)];

        let mut hasher = Sha256::new();
        hasher.update(prefix);
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(display_name.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentFingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lowercase hex SHA-256 of `data`.
pub(crate) fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_lowercase_hex() {
        let fp = ContentFingerprint::compute(b"PACK", "pak0.pak");
        assert_eq!(fp.as_str().len(), 64);
        assert!(fp
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_eq!(fp.short().len(), 12);
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = ContentFingerprint::compute(b"same bytes", "pak0.pak");
        let b = ContentFingerprint::compute(b"same bytes", "pak0.pak");
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_depends_on_name_and_length() {
        let base = ContentFingerprint::compute(b"abc", "pak0.pak");
        assert_ne!(base, ContentFingerprint::compute(b"abc", "pak1.pak"));
        assert_ne!(base, ContentFingerprint::compute(b"abcd", "pak0.pak"));
    }

    #[test]
    fn test_fingerprint_ignores_bytes_past_prefix() {
        let mut a = vec![7u8; FINGERPRINT_PREFIX_LEN + 100];
        let mut b = a.clone();
        a[FINGERPRINT_PREFIX_LEN + 50] = 1;
        b[FINGERPRINT_PREFIX_LEN + 50] = 2;
        assert_eq!(
            ContentFingerprint::compute(&a, "big.pak"),
            ContentFingerprint::compute(&b, "big.pak")
        );

        b[10] = 0;
        assert_ne!(
            ContentFingerprint::compute(&a, "big.pak"),
            ContentFingerprint::compute(&b, "big.pak")
        );
    }
}
