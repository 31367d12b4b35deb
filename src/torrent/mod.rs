//! Module for `.torrent` metadata: the file listing and the piece hashes the
//! recovery engine matches against.
//!
//! Both [v1](http://bittorrent.org/beps/bep_0003.html) and
//! [v2](http://bittorrent.org/beps/bep_0052.html) (and hybrid) torrents can be read,
//! though only v1 piece hashes take part in matching. Per-file fields from
//! [BEP 47](http://bittorrent.org/beps/bep_0047.html) are kept when present.

use crate::util;
use itertools::Itertools;
use std::cmp;
use std::fmt;
use std::path::PathBuf;

mod read;

const PIECE_STRING_LENGTH: usize = 20;
/// Piece length assumed for v2 torrents that do not declare one.
pub const V2_DEFAULT_PIECE_LENGTH: u64 = 16384;

/// A piece in `pieces`--the SHA1 hash of a torrent block.
pub type Piece = Vec<u8>;

/// Torrent metadata version.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TorrentVersion {
    V1,
    V2,
    /// Carries both v1 `pieces` and a v2 `file tree`.
    Hybrid,
}

/// A file contained in a torrent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TorrentFile {
    /// File path, relative to [`TorrentMeta`](struct.TorrentMeta.html)'s `name` field.
    pub path: PathBuf,
    /// File size in bytes. `None` if the torrent does not declare it.
    pub length: Option<u64>,
    /// Offset of the file's first byte in the concatenation of all files.
    pub offset: u64,
    /// Per-file SHA1 ([BEP 47](http://bittorrent.org/beps/bep_0047.html)).
    pub sha1: Option<Piece>,
    /// Attribute string ([BEP 47](http://bittorrent.org/beps/bep_0047.html)), e.g. `"x"` or `"p"`.
    pub attr: Option<String>,
    /// Symlink target ([BEP 47](http://bittorrent.org/beps/bep_0047.html)).
    pub symlink_path: Option<PathBuf>,
}

/// The parts of a *.torrent* file the recovery engine needs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TorrentMeta {
    /// If the torrent contains only 1 file then `name` is the file name.
    /// Otherwise it's the suggested root directory's name.
    pub name: String,
    /// Files in listing order.
    pub files: Vec<TorrentFile>,
    /// Block size in bytes.
    pub piece_length: u64,
    /// SHA1 hashes of each block. Empty for pure v2 torrents.
    pub pieces: Vec<Piece>,
    pub version: TorrentVersion,
}

/// The piece holding a file's opening bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PieceWindow<'a> {
    /// Index into `pieces`.
    pub index: usize,
    /// Expected SHA1 of the window.
    pub hash: &'a [u8],
    /// Number of bytes covered, `piece_length` except for a short last piece.
    pub length: usize,
}

impl TorrentFile {
    /// Padding files ([BEP 47](http://bittorrent.org/beps/bep_0047.html)) carry `p` in `attr`.
    pub fn is_padding(&self) -> bool {
        self.attr.as_ref().map_or(false, |attr| attr.contains('p'))
    }
}

impl TorrentMeta {
    /// Sum of all declared file lengths.
    pub fn total_length(&self) -> u64 {
        self.files.iter().filter_map(|file| file.length).sum()
    }

    /// Index of the piece containing the absolute `offset`.
    pub fn piece_index(&self, offset: u64) -> Option<usize> {
        if self.piece_length == 0 {
            None
        } else {
            util::u64_to_usize(offset / self.piece_length).ok()
        }
    }

    /// The piece that starts exactly at `file`'s first byte and lies entirely
    /// inside it.
    ///
    /// `None` when there are no v1 pieces, when the file does not start on a
    /// piece boundary, when its length is unknown, or when the piece would spill
    /// into the next file. Matching across file boundaries is not attempted.
    pub fn piece_window(&self, file: &TorrentFile) -> Option<PieceWindow> {
        if self.pieces.is_empty() || self.piece_length == 0 {
            return None;
        }
        if file.offset % self.piece_length != 0 {
            return None;
        }

        let index = self.piece_index(file.offset)?;
        let hash = self.pieces.get(index)?;
        let remaining = self.total_length().checked_sub(file.offset)?;
        let length = cmp::min(self.piece_length, remaining);

        if length == 0 || length > file.length? {
            return None;
        }

        Some(PieceWindow {
            index,
            hash,
            length: util::u64_to_usize(length).ok()?,
        })
    }
}

impl fmt::Display for TorrentVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            TorrentVersion::V1 => write!(f, "v1"),
            TorrentVersion::V2 => write!(f, "v2"),
            TorrentVersion::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl fmt::Display for TorrentFile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.path.display())?;
        match self.length {
            Some(length) => writeln!(f, "-size: {} bytes", length)?,
            None => writeln!(f, "-size: unknown")?,
        }
        writeln!(f, "-offset: {}", self.offset)?;
        if let Some(ref sha1) = self.sha1 {
            writeln!(f, "-sha1: {:02x}", sha1.iter().format(""))?;
        }
        if let Some(ref attr) = self.attr {
            writeln!(f, "-attr: {}", attr)?;
        }
        if let Some(ref target) = self.symlink_path {
            writeln!(f, "-symlink path: {}", target.display())?;
        }
        writeln!(f, "========================================")
    }
}

impl fmt::Display for TorrentMeta {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}.torrent", self.name)?;
        writeln!(f, "-version: {}", self.version)?;
        writeln!(f, "-size: {} bytes", self.total_length())?;
        writeln!(f, "-piece length: {} bytes", self.piece_length)?;
        writeln!(f, "-files:")?;
        for (counter, file) in self.files.iter().enumerate() {
            writeln!(f, "[{}] {}", counter + 1, file)?;
        }
        writeln!(
            f,
            "-pieces: [{}]",
            self.pieces
                .iter()
                .format_with(", ", |piece, f| f(&format_args!("[{:02x}]", piece.iter().format("")))),
        )
    }
}

#[cfg(test)]
mod torrent_meta_tests {
    use super::*;

    fn file(path: &str, length: Option<u64>, offset: u64) -> TorrentFile {
        TorrentFile {
            path: PathBuf::from(path),
            length,
            offset,
            sha1: None,
            attr: None,
            symlink_path: None,
        }
    }

    fn meta(files: Vec<TorrentFile>, piece_length: u64, pieces: usize) -> TorrentMeta {
        TorrentMeta {
            name: "sample".to_owned(),
            files,
            piece_length,
            pieces: (0..pieces).map(|i| vec![i as u8; 20]).collect(),
            version: TorrentVersion::V1,
        }
    }

    #[test]
    fn total_length_skips_unknown() {
        let meta = meta(vec![file("a", Some(3), 0), file("b", None, 3)], 4, 1);
        assert_eq!(meta.total_length(), 3);
    }

    #[test]
    fn piece_index_ok() {
        let meta = meta(vec![], 4, 0);
        assert_eq!(meta.piece_index(0), Some(0));
        assert_eq!(meta.piece_index(3), Some(0));
        assert_eq!(meta.piece_index(8), Some(2));
    }

    #[test]
    fn piece_window_short_last_piece() {
        let meta = meta(vec![file("a.gz", Some(11), 0)], 524_288, 1);
        let window = meta.piece_window(&meta.files[0]).unwrap();
        assert_eq!(window.index, 0);
        assert_eq!(window.length, 11);
        assert_eq!(window.hash, &[0u8; 20][..]);
    }

    #[test]
    fn piece_window_aligned_second_file() {
        let meta = meta(vec![file("a", Some(8), 0), file("b.gz", Some(10), 8)], 4, 5);
        let window = meta.piece_window(&meta.files[1]).unwrap();
        assert_eq!(window.index, 2);
        assert_eq!(window.length, 4);
        assert_eq!(window.hash, &[2u8; 20][..]);
    }

    #[test]
    fn piece_window_unaligned() {
        let meta = meta(vec![file("a", Some(3), 0), file("b.gz", Some(10), 3)], 4, 4);
        assert_eq!(meta.piece_window(&meta.files[1]), None);
    }

    #[test]
    fn piece_window_spills_into_next_file() {
        let meta = meta(vec![file("a.gz", Some(3), 0), file("b", Some(10), 3)], 4, 4);
        assert_eq!(meta.piece_window(&meta.files[0]), None);
    }

    #[test]
    fn piece_window_unknown_length() {
        let meta = meta(vec![file("a.gz", None, 0)], 4, 1);
        assert_eq!(meta.piece_window(&meta.files[0]), None);
    }

    #[test]
    fn piece_window_no_pieces() {
        let meta = meta(vec![file("a.gz", Some(3), 0)], 4, 0);
        assert_eq!(meta.piece_window(&meta.files[0]), None);
    }

    #[test]
    fn is_padding_ok() {
        let mut padding = file(".pad/0", Some(3), 0);
        assert!(!padding.is_padding());
        padding.attr = Some("p".to_owned());
        assert!(padding.is_padding());
    }

    #[test]
    fn file_display_ok() {
        let mut f = file("dir1/file.gz", Some(42), 0);
        f.attr = Some("x".to_owned());

        assert_eq!(
            f.to_string(),
            "dir1/file.gz\n\
             -size: 42 bytes\n\
             -offset: 0\n\
             -attr: x\n\
             ========================================\n"
        );
    }

    #[test]
    fn meta_display_ok() {
        let meta = TorrentMeta {
            name: "sample".to_owned(),
            files: vec![file("a", None, 0)],
            piece_length: 2,
            pieces: vec![vec![1, 2], vec![3, 4]],
            version: TorrentVersion::Hybrid,
        };

        assert_eq!(
            meta.to_string(),
            "sample.torrent\n\
             -version: hybrid\n\
             -size: 0 bytes\n\
             -piece length: 2 bytes\n\
             -files:\n\
             [1] a\n\
             -size: unknown\n\
             -offset: 0\n\
             ========================================\n\
             \n\
             -pieces: [[0102], [0304]]\n"
        );
    }
}
