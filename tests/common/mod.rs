#![allow(dead_code)]

use flate2::{Compression, GzBuilder};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use torrent_compress_recovery::bencode::BencodeElem;
use torrent_compress_recovery::hash::sha1_piece;
use torrent_compress_recovery::header::GzipHeader;

pub const PIECE_LENGTH: i64 = 524_288;
pub const MTIME: u32 = 1_700_000_000;

/// A gzip stream as the "original" publisher produced it: best level,
/// a stored file name, and XFL cleared.
pub fn original_gzip(data: &[u8], fname: &str) -> Vec<u8> {
    let mut encoder = GzBuilder::new()
        .mtime(MTIME)
        .filename(fname)
        .write(Vec::new(), Compression::best());
    encoder.write_all(data).unwrap();
    let stream = encoder.finish().unwrap();
    GzipHeader::from_bytes(&stream).unwrap().patch(&stream)
}

/// Raw source of `tests/files/lines.txt.gz`, which zlib wrote at level 9
/// with mtime `MTIME` (XFL cleared).
pub fn zlib_best_source() -> Vec<u8> {
    const WORDS: [&str; 7] = ["alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf"];
    (0..5000_usize)
        .map(|i| format!("{:05} {} {}\n", i, (i * 7919) % 10007, WORDS[(i * 31) % 7]))
        .collect::<String>()
        .into_bytes()
}

pub fn zlib_best_stream() -> Vec<u8> {
    fs::read("tests/files/lines.txt.gz").unwrap()
}

pub fn original_bzip2(data: &[u8]) -> Vec<u8> {
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::best());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// A multi-file v1 torrent named `name`. `pieces` is the concatenated piece hashes.
pub fn torrent_bytes(name: &str, files: &[(&str, u64)], pieces: Vec<u8>) -> Vec<u8> {
    let files = files
        .iter()
        .map(|&(path, length)| {
            let path = path.split('/').map(BencodeElem::from).collect();
            BencodeElem::Dictionary(
                vec![
                    ("length".to_owned(), BencodeElem::Integer(length as i64)),
                    ("path".to_owned(), BencodeElem::List(path)),
                ]
                .into_iter()
                .collect(),
            )
        })
        .collect();
    let info = BencodeElem::Dictionary(
        vec![
            ("name".to_owned(), BencodeElem::from(name)),
            ("piece length".to_owned(), BencodeElem::Integer(PIECE_LENGTH)),
            ("pieces".to_owned(), BencodeElem::Bytes(pieces)),
            ("files".to_owned(), BencodeElem::List(files)),
        ]
        .into_iter()
        .collect(),
    );
    BencodeElem::Dictionary(vec![("info".to_owned(), info)].into_iter().collect()).encode()
}

/// Scratch layout: `<root>/{raw,partial,target}` plus a torrent path.
pub struct Workspace {
    pub root: tempfile::TempDir,
    pub raw_dir: PathBuf,
    pub partial_dir: PathBuf,
    pub target_dir: PathBuf,
    pub torrent: PathBuf,
}

impl Workspace {
    pub fn new() -> Workspace {
        let root = tempfile::tempdir().unwrap();
        let raw_dir = root.path().join("raw");
        let partial_dir = root.path().join("partial");
        let target_dir = root.path().join("target");
        for dir in [&raw_dir, &partial_dir, &target_dir] {
            fs::create_dir_all(dir).unwrap();
        }
        let torrent = root.path().join("sample.torrent");

        Workspace {
            root,
            raw_dir,
            partial_dir,
            target_dir,
            torrent,
        }
    }

    pub fn write(dir: &Path, rel: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, data).unwrap();
        path
    }

    /// Torrent with a single compressed file whose first piece is `compressed`.
    pub fn single_file_torrent(&self, rel: &str, compressed: &[u8]) -> Vec<u8> {
        let bytes = torrent_bytes(
            "sample",
            &[(rel, compressed.len() as u64)],
            sha1_piece(compressed),
        );
        fs::write(&self.torrent, &bytes).unwrap();
        bytes
    }

    pub fn target(&self, rel: &str) -> PathBuf {
        self.target_dir.join("sample").join(rel)
    }
}
