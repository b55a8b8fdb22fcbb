//! Quake II PAK archives.
//!
//! ```text
//! offset 0   "PACK"
//!        4   i32 directory offset
//!        8   i32 directory length (multiple of 64)
//! directory  [ name: 56 bytes NUL-padded | i32 offset | i32 length ] * n
//! ```

use crate::codec::reader::ByteReader;
use crate::codec::DecodeError;

use super::index::{normalize_path, ArchiveEntry, ArchiveIndex};
use super::ArchiveCodec;

/// PAK header length in bytes.
pub const PAK_HEADER_LEN: usize = 12;

/// PAK directory record length in bytes.
pub const PAK_DIR_ENTRY_LEN: usize = 64;

/// Maximum member name length (including the terminating NUL).
pub const PAK_NAME_LEN: usize = 56;

const PAK_MAGIC: &[u8; 4] = b"PACK";

/// Decoder for the PAK directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct PakCodec;

impl PakCodec {
    pub fn new() -> Self {
        Self
    }
}

impl ArchiveCodec for PakCodec {
    fn index(&self, bytes: &[u8]) -> Result<ArchiveIndex, DecodeError> {
        let mut header = ByteReader::new(bytes, "PAK header");
        header.magic(PAK_MAGIC, "PAK")?;
        let dir_offset = header.i32()?;
        let dir_length = header.i32()?;

        if dir_offset < 0 || dir_length < 0 {
            return Err(DecodeError::Invalid {
                format: "PAK",
                reason: format!("negative directory ({} +{})", dir_offset, dir_length),
            });
        }
        let (dir_offset, dir_length) = (dir_offset as usize, dir_length as usize);
        if dir_length % PAK_DIR_ENTRY_LEN != 0 {
            return Err(DecodeError::Invalid {
                format: "PAK",
                reason: format!(
                    "directory length {} is not a multiple of {}",
                    dir_length, PAK_DIR_ENTRY_LEN
                ),
            });
        }
        if dir_offset + dir_length > bytes.len() {
            return Err(DecodeError::Truncated {
                what: "PAK directory",
                needed: dir_offset + dir_length,
                available: bytes.len(),
            });
        }

        let mut dir = ByteReader::at(bytes, dir_offset, "PAK directory");
        let count = dir_length / PAK_DIR_ENTRY_LEN;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let name = dir.fixed_str(PAK_NAME_LEN)?;
            let offset = dir.i32()?;
            let length = dir.i32()?;
            if offset < 0 || length < 0 || offset as usize + length as usize > bytes.len() {
                return Err(DecodeError::Invalid {
                    format: "PAK",
                    reason: format!("member '{}' ({} +{}) outside archive", name, offset, length),
                });
            }
            if normalize_path(&name).is_empty() {
                continue;
            }
            entries.push(ArchiveEntry::new(&name, offset as u64, length as u64));
        }

        Ok(ArchiveIndex::from_entries(entries))
    }
}

/// Builds PAK archives in memory.
///
/// Members are laid out in insertion order directly after the header, with
/// the directory at the end.
///
/// # Example
///
/// ```
/// use pakmount::archive::{ArchiveCodec, PakCodec, PakWriter};
///
/// let bytes = PakWriter::new()
///     .add("pics/colormap.pcx", vec![0u8; 4])
///     .add("default.cfg", b"exec autoexec.cfg".to_vec())
///     .finish()
///     .unwrap();
///
/// let index = PakCodec::new().index(&bytes).unwrap();
/// assert_eq!(index.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct PakWriter {
    members: Vec<(String, Vec<u8>)>,
}

impl PakWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a member. Names are written as given (not normalised).
    pub fn add(mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.members.push((name.into(), data.into()));
        self
    }

    /// Serialise the archive.
    ///
    /// Fails if a name does not fit the 56-byte field or the archive would
    /// exceed the format's 2 GiB offset limit.
    pub fn finish(self) -> Result<Vec<u8>, DecodeError> {
        let mut out = vec![0u8; PAK_HEADER_LEN];
        let mut directory = Vec::with_capacity(self.members.len() * PAK_DIR_ENTRY_LEN);

        for (name, data) in &self.members {
            if name.len() >= PAK_NAME_LEN {
                return Err(DecodeError::Invalid {
                    format: "PAK",
                    reason: format!("member name too long: {}", name),
                });
            }
            let offset = to_i32(out.len())?;
            let length = to_i32(data.len())?;
            out.extend_from_slice(data);

            let mut record = [0u8; PAK_DIR_ENTRY_LEN];
            record[..name.len()].copy_from_slice(name.as_bytes());
            record[56..60].copy_from_slice(&offset.to_le_bytes());
            record[60..64].copy_from_slice(&length.to_le_bytes());
            directory.extend_from_slice(&record);
        }

        let dir_offset = to_i32(out.len())?;
        let dir_length = to_i32(directory.len())?;
        out.extend_from_slice(&directory);
        to_i32(out.len())?;

        out[0..4].copy_from_slice(PAK_MAGIC);
        out[4..8].copy_from_slice(&dir_offset.to_le_bytes());
        out[8..12].copy_from_slice(&dir_length.to_le_bytes());
        Ok(out)
    }
}

fn to_i32(value: usize) -> Result<i32, DecodeError> {
    i32::try_from(value).map_err(|_| DecodeError::Invalid {
        format: "PAK",
        reason: format!("offset {} exceeds 2 GiB", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        PakWriter::new()
            .add("pics/colormap.pcx", b"palette".to_vec())
            .add("Maps\\Base1.bsp", b"IBSP".to_vec())
            .add("x.txt", b"A".to_vec())
            .finish()
            .unwrap()
    }

    #[test]
    fn test_index_written_archive() {
        let bytes = sample();
        let index = PakCodec::new().index(&bytes).unwrap();

        assert_eq!(index.len(), 3);
        let entry = index.get("maps/base1.bsp").unwrap();
        assert_eq!(&bytes[entry.range()], b"IBSP");
        let entry = index.get("x.txt").unwrap();
        assert_eq!(&bytes[entry.range()], b"A");
    }

    #[test]
    fn test_empty_archive() {
        let bytes = PakWriter::new().finish().unwrap();
        assert_eq!(bytes.len(), PAK_HEADER_LEN);
        assert!(PakCodec::new().index(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = sample();
        bytes[0] = b'Z';
        let err = PakCodec::new().index(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::BadMagic { format: "PAK", .. }));
    }

    #[test]
    fn test_truncated_header() {
        let err = PakCodec::new().index(b"PACK\0\0").unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { .. }));
    }

    #[test]
    fn test_directory_past_end() {
        let mut bytes = sample();
        bytes.truncate(bytes.len() - 10);
        let err = PakCodec::new().index(&bytes).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Truncated {
                what: "PAK directory",
                ..
            }
        ));
    }

    #[test]
    fn test_member_outside_archive() {
        let mut bytes = sample();
        let dir_offset = i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        // Corrupt the first record's length.
        bytes[dir_offset + 60..dir_offset + 64].copy_from_slice(&100_000i32.to_le_bytes());
        let err = PakCodec::new().index(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::Invalid { format: "PAK", .. }));
    }

    #[test]
    fn test_name_too_long() {
        let name = "a".repeat(PAK_NAME_LEN);
        assert!(PakWriter::new().add(name, vec![]).finish().is_err());
    }
}
