use super::read_prefix;
use crate::util::ByteBuffer;
use crate::Result;
use itertools::Itertools;
use std::fmt;
use std::path::Path;

pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
pub const GZIP_METHOD_DEFLATE: u8 = 8;
/// Size of the fixed preamble (magic, method, flags, mtime, XFL, OS).
pub const GZIP_MIN_HEADER_SIZE: usize = 10;

pub const GZIP_FLAG_FTEXT: u8 = 1;
pub const GZIP_FLAG_FHCRC: u8 = 2;
pub const GZIP_FLAG_FEXTRA: u8 = 4;
pub const GZIP_FLAG_FNAME: u8 = 8;
pub const GZIP_FLAG_FCOMMENT: u8 = 16;
pub const GZIP_FLAG_RESERVED1: u8 = 32;
pub const GZIP_FLAG_RESERVED2: u8 = 64;
pub const GZIP_FLAG_RESERVED3: u8 = 128;

const GZIP_METHOD_POS: usize = 2;
const GZIP_FLAGS_POS: usize = 3;
const GZIP_MTIME_POS: usize = 4;
const GZIP_XFL_POS: usize = 8;
const GZIP_OS_POS: usize = 9;
const GZIP_XLEN_SIZE: usize = 2;
const OPTIONAL_FIELD_FLAGS: u8 = GZIP_FLAG_FEXTRA | GZIP_FLAG_FNAME | GZIP_FLAG_FCOMMENT;

// Enough for the preamble, a maximal FEXTRA and generous name/comment fields.
const HEADER_READ_LIMIT: u64 = 128 * 1024;

const FLAG_NAMES: [(u8, &str); 8] = [
    (GZIP_FLAG_FTEXT, "FTEXT"),
    (GZIP_FLAG_FHCRC, "FHCRC"),
    (GZIP_FLAG_FEXTRA, "FEXTRA"),
    (GZIP_FLAG_FNAME, "FNAME"),
    (GZIP_FLAG_FCOMMENT, "FCOMMENT"),
    (GZIP_FLAG_RESERVED1, "RESERVED1"),
    (GZIP_FLAG_RESERVED2, "RESERVED2"),
    (GZIP_FLAG_RESERVED3, "RESERVED3"),
];

/// Metadata carried by a gzip member header.
///
/// The XFL byte and the FHCRC checksum are not modeled. An optional
/// field is `Some` iff its flag bit is set in a parsed header.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct GzipHeader {
    pub mtime: u32,
    pub os: u8,
    pub flags: u8,
    pub extra: Option<Vec<u8>>,
    pub fname: Option<Vec<u8>>,
    pub fcomment: Option<Vec<u8>>,
}

// Optional fields of a header as they appear in a buffer.
struct OptionalFields<'a> {
    extra: Option<&'a [u8]>,
    fname: Option<&'a [u8]>,
    fcomment: Option<&'a [u8]>,
    end: usize,
}

impl<'a> OptionalFields<'a> {
    // Walk FEXTRA -> FNAME -> FCOMMENT as announced by `flags`.
    fn parse(bytes: &'a [u8], flags: u8) -> Option<OptionalFields<'a>> {
        let mut buffer = ByteBuffer::new(bytes);
        buffer.advance(GZIP_MIN_HEADER_SIZE);

        let extra = if flags & GZIP_FLAG_FEXTRA != 0 {
            let xlen = buffer.take_exact(GZIP_XLEN_SIZE)?;
            let xlen = u16::from_le_bytes([xlen[0], xlen[1]]);
            Some(buffer.take_exact(usize::from(xlen))?)
        } else {
            None
        };
        let fname = if flags & GZIP_FLAG_FNAME != 0 {
            Some(buffer.take_until(0)?)
        } else {
            None
        };
        let fcomment = if flags & GZIP_FLAG_FCOMMENT != 0 {
            Some(buffer.take_until(0)?)
        } else {
            None
        };

        Some(OptionalFields {
            extra,
            fname,
            fcomment,
            end: buffer.pos(),
        })
    }
}

fn has_preamble(bytes: &[u8]) -> bool {
    bytes.len() >= GZIP_MIN_HEADER_SIZE && bytes[..GZIP_MAGIC.len()] == GZIP_MAGIC
}

impl GzipHeader {
    /// Parse a header from the leading bytes of a gzip stream.
    ///
    /// `None` if the preamble is short, the magic or method is wrong,
    /// or an optional field runs past the end of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Option<GzipHeader> {
        if !has_preamble(bytes) || bytes[GZIP_METHOD_POS] != GZIP_METHOD_DEFLATE {
            return None;
        }

        let flags = bytes[GZIP_FLAGS_POS];
        let mut mtime = [0; 4];
        mtime.copy_from_slice(&bytes[GZIP_MTIME_POS..GZIP_MTIME_POS + 4]);
        let fields = OptionalFields::parse(bytes, flags)?;

        Some(GzipHeader {
            mtime: u32::from_le_bytes(mtime),
            os: bytes[GZIP_OS_POS],
            flags,
            extra: fields.extra.map(<[u8]>::to_vec),
            fname: fields.fname.map(<[u8]>::to_vec),
            fcomment: fields.fcomment.map(<[u8]>::to_vec),
        })
    }

    /// Parse the header of the gzip file at `path`.
    ///
    /// A malformed header is `Ok(None)`; a missing file is `Err(NotFound)`.
    pub fn read_from_file<P>(path: P) -> Result<Option<GzipHeader>>
    where
        P: AsRef<Path>,
    {
        let bytes = read_prefix(path.as_ref(), HEADER_READ_LIMIT)?;
        Ok(Self::from_bytes(&bytes))
    }

    /// Names of the set flag bits, lowest bit first.
    pub fn flag_names(&self) -> Vec<&'static str> {
        FLAG_NAMES
            .iter()
            .filter(|&&(bit, _)| self.flags & bit != 0)
            .map(|&(_, name)| name)
            .collect()
    }

    // Optional-field bits follow the fields actually present.
    fn effective_flags(&self) -> u8 {
        let mut flags = self.flags & !OPTIONAL_FIELD_FLAGS;
        if self.extra.is_some() {
            flags |= GZIP_FLAG_FEXTRA;
        }
        if self.fname.is_some() {
            flags |= GZIP_FLAG_FNAME;
        }
        if self.fcomment.is_some() {
            flags |= GZIP_FLAG_FCOMMENT;
        }
        flags
    }

    /// Rewrite the header of the gzip stream `data` to carry this header's
    /// metadata, leaving everything after the optional fields untouched.
    ///
    /// The fixed preamble takes `mtime`, `os` and the flags, with XFL set to 0.
    /// Optional fields wanted here but absent from `data` are inserted in
    /// FEXTRA, FNAME, FCOMMENT order, and fields `data` carries but this header
    /// lacks are spliced out. FHCRC bytes, if any, stay with the payload.
    ///
    /// `data` is returned unchanged if it is not a gzip stream, if its own
    /// optional fields cannot be delimited, or if `extra` exceeds 65535 bytes.
    pub fn patch(&self, data: &[u8]) -> Vec<u8> {
        if !has_preamble(data) {
            return data.to_vec();
        }
        let payload_start = match OptionalFields::parse(data, data[GZIP_FLAGS_POS]) {
            Some(fields) => fields.end,
            None => return data.to_vec(),
        };
        let xlen = match self.extra {
            Some(ref extra) => match u16::try_from(extra.len()) {
                Ok(xlen) => Some(xlen),
                Err(_) => return data.to_vec(),
            },
            None => None,
        };

        let mut patched = Vec::with_capacity(data.len() + self.optional_fields_len());
        patched.extend_from_slice(&data[..GZIP_FLAGS_POS]);
        patched.push(self.effective_flags());
        patched.extend_from_slice(&self.mtime.to_le_bytes());
        patched.push(0);
        patched.push(self.os);
        debug_assert_eq!(patched.len(), GZIP_MIN_HEADER_SIZE);
        debug_assert_eq!(patched[GZIP_XFL_POS], 0);

        if let (Some(xlen), Some(extra)) = (xlen, self.extra.as_ref()) {
            patched.extend_from_slice(&xlen.to_le_bytes());
            patched.extend_from_slice(extra);
        }
        if let Some(ref fname) = self.fname {
            patched.extend_from_slice(fname);
            patched.push(0);
        }
        if let Some(ref fcomment) = self.fcomment {
            patched.extend_from_slice(fcomment);
            patched.push(0);
        }

        patched.extend_from_slice(&data[payload_start..]);
        patched
    }

    fn optional_fields_len(&self) -> usize {
        self.extra.as_ref().map_or(0, |e| GZIP_XLEN_SIZE + e.len())
            + self.fname.as_ref().map_or(0, |n| n.len() + 1)
            + self.fcomment.as_ref().map_or(0, |c| c.len() + 1)
    }
}

impl fmt::Display for GzipHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let flag_names = self.flag_names();

        writeln!(f, "mtime: {}", self.mtime)?;
        writeln!(f, "OS: {}", self.os)?;
        writeln!(f, "flags: {:08b}", self.flags)?;
        if flag_names.is_empty() {
            write!(f, "flag_names: (none)")?;
        } else {
            write!(f, "flag_names: {}", flag_names.iter().format(", "))?;
        }
        if let Some(ref extra) = self.extra {
            write!(f, "\nextra: {} bytes", extra.len())?;
        }
        if let Some(ref fname) = self.fname {
            write!(f, "\nfname: {}", String::from_utf8_lossy(fname))?;
        }
        if let Some(ref fcomment) = self.fcomment {
            write!(f, "\nfcomment: {}", String::from_utf8_lossy(fcomment))?;
        }
        Ok(())
    }
}
