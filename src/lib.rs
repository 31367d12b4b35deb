//! [`torrent_compress_recovery`] rebuilds the exact compressed bytes of `.gz`/`.bz2` files
//! inside a torrent when only the torrent, the uncompressed sources, and a partial download
//! are at hand. It is dual-licensed under [Apache 2.0] and [MIT].
//!
//! # *Quick Start*
//! Heal a download, falling back to plain compression when no exact match exists.
//!
//! ```no_run
//! use torrent_compress_recovery::recover::Recovery;
//! use torrent_compress_recovery::torrent::TorrentMeta;
//!
//! let torrent = TorrentMeta::read_from_file("sample.torrent").unwrap();
//! let result = Recovery::new(&torrent, "raw/", "partial/", "out/")
//!     .set_raw_fallback(true)
//!     .run()
//!     .unwrap();
//! println!("{}", result);
//! ```
//!
//! Check every complete partial `.gz` against its raw source without reconstructing it.
//!
//! ```no_run
//! use torrent_compress_recovery::torrent::TorrentMeta;
//! use torrent_compress_recovery::verify::verify_last_piece_against_raw;
//!
//! let torrent = TorrentMeta::read_from_file("sample.torrent").unwrap();
//! for (path, ok) in verify_last_piece_against_raw(&torrent, "raw/", "partial/").unwrap() {
//!     println!("{}: {}", path.display(), ok);
//! }
//! ```
//!
//! # *Overview*
//! The compressed payload is never decoded or re-encoded by this crate. Instead, candidates
//! are produced by re-running real compressors (in-process `flate2`/`bzip2`, plus the
//! `gzip`/`pigz`/`bzip2`/`pbzip2` executables found on the system) and the captured
//! header of the partial download is imposed on each of them. The first candidate whose
//! leading bytes hash to the torrent's piece hash wins.
//!
//! ## Functionality
//! - bencode parsing => [`BencodeElem`]
//! - torrent metadata (v1, v2, hybrid) => [`TorrentMeta`]
//! - gzip/bzip2 header codec => [`GzipHeader`], [`Bzip2Header`]
//! - candidate search => [`find_matching_candidate()`]
//! - trailer verification => [`verify_raw_against_gz()`]
//! - orchestration => [`Recovery`]
//!
//! # *Correctness*
//! Recovery is best-effort. When no enumerated tool/level/flag combination reproduces the
//! piece hash the file is reported as missing (or compressed directly with raw fallback).
//!
//! [`torrent_compress_recovery`]: index.html
//! [Apache 2.0]: https://www.apache.org/licenses/LICENSE-2.0
//! [MIT]: https://opensource.org/licenses/MIT
//! [`BencodeElem`]: bencode/enum.BencodeElem.html
//! [`TorrentMeta`]: torrent/struct.TorrentMeta.html
//! [`GzipHeader`]: header/struct.GzipHeader.html
//! [`Bzip2Header`]: header/struct.Bzip2Header.html
//! [`find_matching_candidate()`]: candidate/fn.find_matching_candidate.html
//! [`verify_raw_against_gz()`]: verify/fn.verify_raw_against_gz.html
//! [`Recovery`]: recover/struct.Recovery.html

use std::borrow::Cow;
use std::path::PathBuf;
use thiserror::Error;

pub(crate) mod util;
#[macro_use]
pub mod bencode;
pub mod candidate;
pub mod compressors;
pub mod hash;
pub mod header;
pub mod recover;
pub mod torrent;
pub mod verify;

pub use recover::{recover, RecoveryResult};

/// Custom error.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// IO error occurred.
    #[error("IO error occurred: {0}")]
    Io(#[from] std::io::Error),

    /// A file required by the operation does not exist.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The bencode is found to be bad before we can parse the torrent,
    /// so the torrent may or may not be malformed.
    #[error("malformed bencode: {0}")]
    MalformedBencode(Cow<'static, str>),

    /// Bencode is fine, but parsed data is gibberish, so we
    /// can't extract a torrent from it.
    #[error("malformed torrent: {0}")]
    MalformedTorrent(Cow<'static, str>),

    /// Conversion between numeric types (e.g. `i64 -> u64`) has failed.
    #[error("numeric conversion failed: {0}")]
    FailedNumericConv(Cow<'static, str>),

    /// No raw-fallback compressor is registered for an extension.
    #[error("no compressor registered for extension {0}")]
    UnknownExtension(String),
}

pub type Result<T> = std::result::Result<T, RecoveryError>;
