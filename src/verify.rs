//! Trailer verification: compare a gzip file's CRC32/ISIZE trailer with its raw
//! source without reconstructing anything.
//!
//! This is a heuristic. The trailer is read from the last 8 bytes whether or
//! not the file is a well-formed gzip stream.

use crate::header::CompressionFormat;
use crate::torrent::TorrentMeta;
use crate::util;
use crate::{RecoveryError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Bytes read per step when checksumming a raw file.
pub const CHUNK_SIZE: usize = 8192;
/// CRC32 (LE) followed by ISIZE (LE).
pub const GZIP_TRAILER_SIZE: u64 = 8;

/// The CRC32 and size (mod 2^32) of uncompressed data.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct GzipTrailer {
    pub crc32: u32,
    pub isize: u32,
}

/// Interpret the final 8 bytes of the file at `path` as a gzip trailer.
///
/// `Ok(None)` if the file is shorter than 8 bytes.
pub fn read_gzip_trailer<P>(path: P) -> Result<Option<GzipTrailer>>
where
    P: AsRef<Path>,
{
    let mut file = util::open_file(path.as_ref())?;
    if file.metadata()?.len() < GZIP_TRAILER_SIZE {
        return Ok(None);
    }

    let mut trailer = [0; 8];
    file.seek(SeekFrom::End(-(GZIP_TRAILER_SIZE as i64)))?;
    file.read_exact(&mut trailer)?;

    Ok(Some(GzipTrailer {
        crc32: u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]),
        isize: u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]),
    }))
}

/// Stream the file at `path` through CRC32, returning what a gzip trailer
/// for it would hold. An empty file yields `(0, 0)`.
pub fn compute_raw_crc32_and_isize<P>(path: P) -> Result<GzipTrailer>
where
    P: AsRef<Path>,
{
    let mut file = util::open_file(path.as_ref())?;
    let mut hasher = crc32fast::Hasher::new();
    let mut size: u64 = 0;
    let mut chunk = vec![0; CHUNK_SIZE];

    loop {
        let read = file.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        hasher.update(&chunk[..read]);
        size += util::usize_to_u64(read)?;
    }

    Ok(GzipTrailer {
        crc32: hasher.finalize(),
        // ISIZE is the size modulo 2^32
        isize: size as u32,
    })
}

/// Whether the trailer of `gz` matches the checksum of `raw`.
///
/// `false` if `gz` is too short to have a trailer. Both files must
/// exist, otherwise `Err(NotFound)`.
pub fn verify_raw_against_gz<P, Q>(raw: P, gz: Q) -> Result<bool>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let (raw, gz) = (raw.as_ref(), gz.as_ref());
    for path in [raw, gz] {
        if !path.is_file() {
            return Err(RecoveryError::NotFound(path.to_path_buf()));
        }
    }

    match read_gzip_trailer(gz)? {
        Some(trailer) => Ok(compute_raw_crc32_and_isize(raw)? == trailer),
        None => Ok(false),
    }
}

/// Check every complete gzip file of the torrent found in `partial_dir`
/// against its raw source in `raw_dir`.
///
/// Only files with a trailer-carrying extension and a declared length are
/// considered, and only when `partial_dir/<path>` is at least that long.
/// The raw source is `raw_dir/<path>` minus its extension; when it is absent
/// the entry maps to `false`.
pub fn verify_last_piece_against_raw<P, Q>(
    torrent: &TorrentMeta,
    raw_dir: P,
    partial_dir: Q,
) -> Result<BTreeMap<PathBuf, bool>>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let (raw_dir, partial_dir) = (raw_dir.as_ref(), partial_dir.as_ref());
    let mut results = BTreeMap::new();

    for file in &torrent.files {
        let has_trailer =
            CompressionFormat::from_path(&file.path).map_or(false, CompressionFormat::has_trailer);
        let length = match file.length {
            Some(length) if has_trailer => length,
            _ => continue,
        };

        let partial = partial_dir.join(&file.path);
        match fs::metadata(&partial) {
            Ok(metadata) if metadata.is_file() && metadata.len() >= length => (),
            _ => {
                debug!(file = %file.path.display(), "no complete partial file");
                continue;
            }
        }

        let raw = raw_dir.join(util::strip_extension(&file.path));
        let verified = if raw.is_file() {
            verify_raw_against_gz(&raw, &partial)?
        } else {
            false
        };
        debug!(file = %file.path.display(), verified, "checked trailer");
        results.insert(file.path.clone(), verified);
    }

    Ok(results)
}
