//! Container header codec for gzip and bzip2.
//!
//! A header is read from the opening bytes of a (possibly partial) download and
//! then imposed on freshly compressed candidates, so that only the compressed
//! payload is left to chance.

use crate::util;
use crate::Result;
use std::fmt;
use std::io::Read;
use std::path::Path;

mod bz2;
mod gzip;

pub use self::bz2::*;
pub use self::gzip::*;

/// Compressed container recognised by file extension.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CompressionFormat {
    Gzip,
    Bzip2,
}

/// A captured header of either format.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Header {
    Gzip(GzipHeader),
    Bzip2(Bzip2Header),
}

impl CompressionFormat {
    /// `".gz"` or `".bz2"`, matched case-sensitively.
    pub fn from_extension(ext: &str) -> Option<CompressionFormat> {
        match ext {
            ".gz" => Some(CompressionFormat::Gzip),
            ".bz2" => Some(CompressionFormat::Bzip2),
            _ => None,
        }
    }

    pub fn from_path<P>(path: P) -> Option<CompressionFormat>
    where
        P: AsRef<Path>,
    {
        util::dotted_extension(path).and_then(|ext| Self::from_extension(&ext))
    }

    pub fn extension(self) -> &'static str {
        match self {
            CompressionFormat::Gzip => ".gz",
            CompressionFormat::Bzip2 => ".bz2",
        }
    }

    /// Whether the container ends with a CRC32/size trailer.
    pub fn has_trailer(self) -> bool {
        match self {
            CompressionFormat::Gzip => true,
            CompressionFormat::Bzip2 => false,
        }
    }
}

impl Header {
    /// Parse the header of the file at `path`, choosing the codec by extension.
    ///
    /// `Ok(None)` for unrecognised extensions and malformed headers.
    pub fn read_from_file<P>(path: P) -> Result<Option<Header>>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        match CompressionFormat::from_path(path) {
            Some(CompressionFormat::Gzip) => Ok(GzipHeader::read_from_file(path)?.map(Header::Gzip)),
            Some(CompressionFormat::Bzip2) => {
                Ok(Bzip2Header::read_from_file(path)?.map(Header::Bzip2))
            }
            None => Ok(None),
        }
    }

    pub fn format(&self) -> CompressionFormat {
        match *self {
            Header::Gzip(_) => CompressionFormat::Gzip,
            Header::Bzip2(_) => CompressionFormat::Bzip2,
        }
    }

    /// Rewrite the header of `data` to match `self`.
    pub fn patch(&self, data: &[u8]) -> Vec<u8> {
        match *self {
            Header::Gzip(ref header) => header.patch(data),
            Header::Bzip2(ref header) => header.patch(data),
        }
    }
}

impl fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            CompressionFormat::Gzip => write!(f, "gzip"),
            CompressionFormat::Bzip2 => write!(f, "bzip2"),
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Header::Gzip(ref header) => fmt::Display::fmt(header, f),
            Header::Bzip2(ref header) => fmt::Display::fmt(header, f),
        }
    }
}

// Read at most `limit` leading bytes of `path`.
// A missing file is reported as `NotFound`.
fn read_prefix(path: &Path, limit: u64) -> Result<Vec<u8>> {
    let file = util::open_file(path)?;
    let mut bytes = Vec::new();
    file.take(limit).read_to_end(&mut bytes)?;
    Ok(bytes)
}
