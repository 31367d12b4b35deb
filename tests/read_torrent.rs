mod common;

use std::fs;
use std::path::PathBuf;
use torrent_compress_recovery::bencode::BencodeElem;
use torrent_compress_recovery::hash::sha1_piece;
use torrent_compress_recovery::torrent::{TorrentMeta, TorrentVersion};
use torrent_compress_recovery::RecoveryError;

#[test]
fn read_multi_file_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.torrent");
    let mut pieces = sha1_piece(b"a");
    pieces.extend(sha1_piece(b"b"));
    fs::write(
        &path,
        common::torrent_bytes("sample", &[("a.txt.gz", 100), ("sub/b.bz2", 50)], pieces),
    )
    .unwrap();

    let torrent = TorrentMeta::read_from_file(&path).unwrap();
    assert_eq!(torrent.name, "sample");
    assert_eq!(torrent.version, TorrentVersion::V1);
    assert_eq!(torrent.piece_length, common::PIECE_LENGTH as u64);
    assert_eq!(torrent.pieces, vec![sha1_piece(b"a"), sha1_piece(b"b")]);
    assert_eq!(torrent.files.len(), 2);
    assert_eq!(torrent.files[0].path, PathBuf::from("a.txt.gz"));
    assert_eq!(torrent.files[0].length, Some(100));
    assert_eq!(torrent.files[0].offset, 0);
    assert_eq!(torrent.files[1].path, PathBuf::from("sub").join("b.bz2"));
    assert_eq!(torrent.files[1].offset, 100);
    assert_eq!(torrent.total_length(), 150);
}

#[test]
fn read_from_file_name_falls_back_to_stem() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nameless.torrent");
    let info = BencodeElem::Dictionary(
        vec![
            ("length".to_owned(), BencodeElem::Integer(10)),
            ("piece length".to_owned(), BencodeElem::Integer(16384)),
            ("pieces".to_owned(), BencodeElem::Bytes(sha1_piece(b"x"))),
        ]
        .into_iter()
        .collect(),
    );
    let root = BencodeElem::Dictionary(vec![("info".to_owned(), info)].into_iter().collect());
    fs::write(&path, root.encode()).unwrap();

    let torrent = TorrentMeta::read_from_file(&path).unwrap();
    assert_eq!(torrent.name, "nameless");
    assert_eq!(torrent.files.len(), 1);
    assert_eq!(torrent.files[0].path, PathBuf::from("nameless"));
    assert_eq!(torrent.files[0].length, Some(10));
}

#[test]
fn read_from_file_not_found() {
    let dir = tempfile::tempdir().unwrap();
    match TorrentMeta::read_from_file(dir.path().join("absent.torrent")) {
        Err(RecoveryError::NotFound(path)) => assert!(path.ends_with("absent.torrent")),
        _ => assert!(false),
    }
}

#[test]
fn read_from_bytes_bad_bencode() {
    match TorrentMeta::read_from_bytes(b"d4:info") {
        Err(RecoveryError::MalformedBencode(_)) => (),
        _ => assert!(false),
    }
}

#[test]
fn read_v2_file_tree() {
    let leaf = |length: i64| {
        let attrs = BencodeElem::Dictionary(
            vec![("length".to_owned(), BencodeElem::Integer(length))]
                .into_iter()
                .collect(),
        );
        BencodeElem::Dictionary(vec![("".to_owned(), attrs)].into_iter().collect())
    };
    let sub = BencodeElem::Dictionary(vec![("b.gz".to_owned(), leaf(7))].into_iter().collect());
    let tree = BencodeElem::Dictionary(
        vec![("a.gz".to_owned(), leaf(5)), ("sub".to_owned(), sub)]
            .into_iter()
            .collect(),
    );
    let info = BencodeElem::Dictionary(
        vec![
            ("name".to_owned(), BencodeElem::from("tree")),
            ("meta version".to_owned(), BencodeElem::Integer(2)),
            ("piece length".to_owned(), BencodeElem::Integer(16384)),
            ("file tree".to_owned(), tree),
        ]
        .into_iter()
        .collect(),
    );
    let root = BencodeElem::Dictionary(vec![("info".to_owned(), info)].into_iter().collect());

    let torrent = TorrentMeta::read_from_bytes(root.encode()).unwrap();
    assert_eq!(torrent.version, TorrentVersion::V2);
    assert!(torrent.pieces.is_empty());
    let paths: Vec<PathBuf> = torrent.files.iter().map(|file| file.path.clone()).collect();
    assert_eq!(
        paths,
        vec![PathBuf::from("a.gz"), PathBuf::from("sub").join("b.gz")]
    );
    assert_eq!(torrent.files[1].offset, 5);
}

#[test]
fn read_bep47_fields() {
    let file = |path: &str, length: i64, attr: Option<&str>| {
        let mut entries = vec![
            ("length".to_owned(), BencodeElem::Integer(length)),
            (
                "path".to_owned(),
                BencodeElem::List(vec![BencodeElem::from(path)]),
            ),
            ("sha1".to_owned(), BencodeElem::Bytes(sha1_piece(path.as_bytes()))),
        ];
        if let Some(attr) = attr {
            entries.push(("attr".to_owned(), BencodeElem::from(attr)));
        }
        BencodeElem::Dictionary(entries.into_iter().collect())
    };
    let info = BencodeElem::Dictionary(
        vec![
            ("name".to_owned(), BencodeElem::from("padded")),
            ("piece length".to_owned(), BencodeElem::Integer(16384)),
            ("pieces".to_owned(), BencodeElem::Bytes(sha1_piece(b"p"))),
            (
                "files".to_owned(),
                BencodeElem::List(vec![
                    file("a.gz", 10, None),
                    file(".pad/16374", 16374, Some("p")),
                ]),
            ),
        ]
        .into_iter()
        .collect(),
    );
    let root = BencodeElem::Dictionary(vec![("info".to_owned(), info)].into_iter().collect());

    let torrent = TorrentMeta::read_from_bytes(root.encode()).unwrap();
    assert_eq!(torrent.files[0].sha1, Some(sha1_piece(b"a.gz")));
    assert!(!torrent.files[0].is_padding());
    assert_eq!(torrent.files[1].attr.as_deref(), Some("p"));
    assert!(torrent.files[1].is_padding());
}
