use crate::{RecoveryError, Result};
use conv::ValueFrom;
use std::any;
use std::borrow::Cow;
use std::fmt::Display;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

// Lossless numeric conversion, or `FailedNumericConv` naming both the value and the target type.
fn convert<Dst, Src>(src: Src) -> Result<Dst>
where
    Dst: ValueFrom<Src>,
    Src: Copy + Display,
{
    Dst::value_from(src).map_err(|_| {
        RecoveryError::FailedNumericConv(Cow::Owned(format!(
            "{} does not fit into {}.",
            src,
            any::type_name::<Dst>()
        )))
    })
}

pub(crate) fn i64_to_u64(src: i64) -> Result<u64> {
    convert(src)
}

pub(crate) fn i64_to_usize(src: i64) -> Result<usize> {
    convert(src)
}

pub(crate) fn u64_to_usize(src: u64) -> Result<usize> {
    convert(src)
}

pub(crate) fn usize_to_u64(src: usize) -> Result<u64> {
    convert(src)
}

/// Open `path` for reading, reporting a missing file as `NotFound`.
pub(crate) fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => RecoveryError::NotFound(path.to_path_buf()),
        _ => RecoveryError::Io(e),
    })
}

/// Returns the extension of `path` with its leading dot (e.g. `".gz"`).
pub(crate) fn dotted_extension<P>(path: P) -> Option<String>
where
    P: AsRef<Path>,
{
    path.as_ref()
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
}

// "dir/a.txt.gz" -> "dir/a.txt"
pub(crate) fn strip_extension<P>(path: P) -> PathBuf
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    match path.file_stem() {
        Some(stem) => path.with_file_name(stem),
        None => path.to_path_buf(),
    }
}

/// Forward-only cursor over a byte slice.
///
/// Every `take_*` either consumes what it returns or leaves the cursor
/// where it was.
pub(crate) struct ByteBuffer<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> ByteBuffer<'a> {
    pub(crate) fn new(data: &'a [u8]) -> ByteBuffer<'a> {
        ByteBuffer { data, cursor: 0 }
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.cursor..]
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.rest().first().copied()
    }

    /// Move forward by up to `step` bytes.
    pub(crate) fn advance(&mut self, step: usize) {
        self.cursor = self.cursor.saturating_add(step).min(self.data.len());
    }

    pub(crate) fn pos(&self) -> usize {
        self.cursor
    }

    pub(crate) fn take_exact(&mut self, len: usize) -> Option<&'a [u8]> {
        let rest = self.rest();
        if len > rest.len() {
            return None;
        }
        self.cursor += len;
        Some(&rest[..len])
    }

    /// Bytes before the next `delimiter`. The delimiter itself is consumed too.
    pub(crate) fn take_until(&mut self, delimiter: u8) -> Option<&'a [u8]> {
        let rest = self.rest();
        let end = rest.iter().position(|&b| b == delimiter)?;
        self.cursor += end + 1;
        Some(&rest[..end])
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.cursor >= self.data.len()
    }
}
