//! Little-endian cursor over a byte slice.
//!
//! Every read is bounds-checked and reports a [`DecodeError::Truncated`]
//! naming the structure being decoded.

use super::DecodeError;

/// Bounds-checked little-endian reader.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    what: &'static str,
}

impl<'a> ByteReader<'a> {
    /// Create a reader positioned at `pos`.
    ///
    /// `what` names the structure for error messages (e.g. "PAK header").
    pub(crate) fn at(data: &'a [u8], pos: usize, what: &'static str) -> Self {
        Self { data, pos, what }
    }

    pub(crate) fn new(data: &'a [u8], what: &'static str) -> Self {
        Self::at(data, 0, what)
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(len).ok_or(DecodeError::Truncated {
            what: self.what,
            needed: usize::MAX,
            available: self.data.len(),
        })?;
        if end > self.data.len() {
            return Err(DecodeError::Truncated {
                what: self.what,
                needed: end,
                available: self.data.len(),
            });
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn skip(&mut self, len: usize) -> Result<(), DecodeError> {
        self.take(len).map(|_| ())
    }

    pub(crate) fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, DecodeError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn i32(&mut self) -> Result<i32, DecodeError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a fixed-width NUL-padded string field.
    pub(crate) fn fixed_str(&mut self, len: usize) -> Result<String, DecodeError> {
        let raw = self.take(len)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    /// Read a 4-byte magic and compare against `expected`.
    pub(crate) fn magic(
        &mut self,
        expected: &[u8; 4],
        format: &'static str,
    ) -> Result<(), DecodeError> {
        let found = self.take(4)?;
        if found != expected {
            return Err(DecodeError::BadMagic {
                format,
                expected: String::from_utf8_lossy(expected).into_owned(),
                found: String::from_utf8_lossy(found).into_owned(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_little_endian() {
        let data = [0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0xff];
        let mut reader = ByteReader::new(&data, "test");
        assert_eq!(reader.u16().unwrap(), 1);
        assert_eq!(reader.u32().unwrap(), 2);
        assert_eq!(reader.u8().unwrap(), 0xff);
        assert_eq!(reader.position(), 7);
    }

    #[test]
    fn test_truncated_read_reports_structure() {
        let data = [0u8; 3];
        let mut reader = ByteReader::new(&data, "header");
        let err = reader.u32().unwrap_err();
        assert_eq!(
            err,
            DecodeError::Truncated {
                what: "header",
                needed: 4,
                available: 3
            }
        );
    }

    #[test]
    fn test_fixed_str_stops_at_nul() {
        let mut data = b"pics/a.pcx".to_vec();
        data.resize(16, 0);
        let mut reader = ByteReader::new(&data, "name");
        assert_eq!(reader.fixed_str(16).unwrap(), "pics/a.pcx");
    }

    #[test]
    fn test_magic_mismatch() {
        let mut reader = ByteReader::new(b"PAKX", "header");
        let err = reader.magic(b"PACK", "PAK").unwrap_err();
        assert!(matches!(err, DecodeError::BadMagic { format: "PAK", .. }));
    }
}
