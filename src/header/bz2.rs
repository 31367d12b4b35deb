use super::read_prefix;
use crate::Result;
use std::fmt;
use std::path::Path;

pub const BZIP2_MAGIC: [u8; 3] = *b"BZh";
/// "BZh" followed by the level digit.
pub const BZIP2_HEADER_SIZE: usize = 4;
pub const BZIP2_MIN_LEVEL: u8 = 1;
pub const BZIP2_MAX_LEVEL: u8 = 9;

const BZIP2_LEVEL_POS: usize = 3;

/// The only metadata a bzip2 stream carries: its block size level.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Bzip2Header {
    /// Compression level, 1 to 9 (block size is `level * 100k`).
    pub level: u8,
}

fn level_from_digit(digit: u8) -> Option<u8> {
    let level = digit.checked_sub(b'0')?;
    if (BZIP2_MIN_LEVEL..=BZIP2_MAX_LEVEL).contains(&level) {
        Some(level)
    } else {
        None
    }
}

fn has_magic(bytes: &[u8]) -> bool {
    bytes.len() >= BZIP2_HEADER_SIZE && bytes[..BZIP2_MAGIC.len()] == BZIP2_MAGIC
}

impl Bzip2Header {
    /// `None` unless `bytes` starts with "BZh" and a digit in '1'..='9'.
    pub fn from_bytes(bytes: &[u8]) -> Option<Bzip2Header> {
        if !has_magic(bytes) {
            return None;
        }
        level_from_digit(bytes[BZIP2_LEVEL_POS]).map(|level| Bzip2Header { level })
    }

    /// Parse the header of the bzip2 file at `path`.
    ///
    /// A malformed header is `Ok(None)`; a missing file is `Err(NotFound)`.
    pub fn read_from_file<P>(path: P) -> Result<Option<Bzip2Header>>
    where
        P: AsRef<Path>,
    {
        let bytes = read_prefix(path.as_ref(), BZIP2_HEADER_SIZE as u64)?;
        Ok(Self::from_bytes(&bytes))
    }

    /// Overwrite the level digit of `data`.
    ///
    /// `data` is returned unchanged if it lacks the bzip2 magic or is
    /// shorter than the header, or if `level` is out of range.
    pub fn patch(&self, data: &[u8]) -> Vec<u8> {
        let mut patched = data.to_vec();
        if has_magic(data) && (BZIP2_MIN_LEVEL..=BZIP2_MAX_LEVEL).contains(&self.level) {
            patched[BZIP2_LEVEL_POS] = b'0' + self.level;
        }
        patched
    }
}

impl fmt::Display for Bzip2Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "compression level: {}", self.level)
    }
}

#[cfg(test)]
mod bzip2_header_tests {
    use super::*;

    #[test]
    fn from_bytes_ok() {
        assert_eq!(
            Bzip2Header::from_bytes(b"BZh91AY&SY"),
            Some(Bzip2Header { level: 9 })
        );
        assert_eq!(
            Bzip2Header::from_bytes(b"BZh1"),
            Some(Bzip2Header { level: 1 })
        );
    }

    #[test]
    fn from_bytes_bad_level() {
        assert_eq!(Bzip2Header::from_bytes(b"BZh0"), None);
        assert_eq!(Bzip2Header::from_bytes(b"BZh:"), None);
        assert_eq!(Bzip2Header::from_bytes(b"BZh\x01"), None);
    }

    #[test]
    fn from_bytes_bad_magic() {
        assert_eq!(Bzip2Header::from_bytes(b"BZx9"), None);
        assert_eq!(Bzip2Header::from_bytes(b"BZh"), None);
    }

    #[test]
    fn patch_ok() {
        let header = Bzip2Header { level: 6 };
        assert_eq!(header.patch(b"BZh91AY&SY"), b"BZh61AY&SY".to_vec());
    }

    #[test]
    fn patch_not_bzip2() {
        let header = Bzip2Header { level: 6 };
        assert_eq!(header.patch(b"BZ"), b"BZ".to_vec());
        assert_eq!(header.patch(b"\x1f\x8b\x08\x00"), b"\x1f\x8b\x08\x00".to_vec());
    }

    #[test]
    fn patch_round_trip() {
        let bytes = b"BZh31AY&SY".to_vec();
        let header = Bzip2Header::from_bytes(&bytes).unwrap();
        assert_eq!(header.patch(&bytes), bytes);
    }

    #[test]
    fn display_ok() {
        assert_eq!(Bzip2Header { level: 9 }.to_string(), "compression level: 9");
    }
}
