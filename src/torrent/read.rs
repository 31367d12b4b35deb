use super::*;
use crate::bencode::BencodeElem;
use crate::util;
use crate::{RecoveryError, Result};
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

type Dictionary = HashMap<String, BencodeElem>;

impl TorrentFile {
    fn extract_file(elem: BencodeElem, offset: u64) -> Result<TorrentFile> {
        match elem {
            BencodeElem::Dictionary(dict) => Ok(TorrentFile {
                length: Self::extract_file_length(&dict)?,
                path: Self::extract_file_path(&dict)?,
                offset,
                sha1: Self::extract_sha1(&dict),
                attr: Self::extract_attr(&dict),
                symlink_path: Self::extract_symlink_path(&dict),
            }),
            _ => Err(RecoveryError::MalformedTorrent(Cow::Borrowed(
                "\"files\" contains a non-dictionary element.",
            ))),
        }
    }

    // A v2 "file tree" leaf is `{"": {"length": .., "pieces root": ..}}`.
    fn extract_tree_leaf(dict: &Dictionary, path: PathBuf, offset: u64) -> Result<TorrentFile> {
        Ok(TorrentFile {
            length: Self::extract_file_length(dict)?,
            path,
            offset,
            sha1: Self::extract_sha1(dict),
            attr: Self::extract_attr(dict),
            symlink_path: Self::extract_symlink_path(dict),
        })
    }

    fn extract_file_length(dict: &Dictionary) -> Result<Option<u64>> {
        match dict.get("length") {
            Some(&BencodeElem::Integer(len)) => {
                if len >= 0 {
                    Ok(Some(util::i64_to_u64(len)?))
                } else {
                    Err(RecoveryError::MalformedTorrent(Cow::Borrowed(
                        "\"length\" < 0.",
                    )))
                }
            }
            Some(_) => Err(RecoveryError::MalformedTorrent(Cow::Borrowed(
                "\"length\" does not map to an integer.",
            ))),
            None => Ok(None),
        }
    }

    fn extract_file_path(dict: &Dictionary) -> Result<PathBuf> {
        match dict.get("path") {
            Some(BencodeElem::List(list)) => {
                if list.is_empty() {
                    Err(RecoveryError::MalformedTorrent(Cow::Borrowed(
                        "\"path\" maps to a 0-length list.",
                    )))
                } else {
                    let mut path = PathBuf::new();
                    for component in list {
                        match component.as_bytes() {
                            Some(bytes) => path.push(path_component(bytes)?),
                            None => {
                                return Err(RecoveryError::MalformedTorrent(Cow::Borrowed(
                                    "\"path\" contains a non-string element.",
                                )))
                            }
                        }
                    }
                    Ok(path)
                }
            }
            Some(_) => Err(RecoveryError::MalformedTorrent(Cow::Borrowed(
                "\"path\" does not map to a list.",
            ))),
            None => Err(RecoveryError::MalformedTorrent(Cow::Borrowed(
                "\"path\" does not exist.",
            ))),
        }
    }

    // Anything other than a 20-byte string is ignored.
    fn extract_sha1(dict: &Dictionary) -> Option<Piece> {
        dict.get("sha1")
            .and_then(BencodeElem::as_bytes)
            .filter(|bytes| bytes.len() == PIECE_STRING_LENGTH)
            .map(|bytes| bytes.to_vec())
    }

    fn extract_attr(dict: &Dictionary) -> Option<String> {
        dict.get("attr")
            .and_then(BencodeElem::as_bytes)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    fn extract_symlink_path(dict: &Dictionary) -> Option<PathBuf> {
        match dict.get("symlink path") {
            Some(BencodeElem::List(list)) => Some(
                list.iter()
                    .filter_map(BencodeElem::as_bytes)
                    .map(|bytes| String::from_utf8_lossy(bytes).nfc().collect::<String>())
                    .collect(),
            ),
            _ => None,
        }
    }
}

impl TorrentMeta {
    /// Read a torrent from `bytes`.
    ///
    /// The info dictionary must carry `name`.
    pub fn read_from_bytes<B>(bytes: B) -> Result<TorrentMeta>
    where
        B: AsRef<[u8]>,
    {
        Self::from_parsed(BencodeElem::from_bytes(bytes)?, None)
    }

    /// Read a torrent from the file at `path`.
    ///
    /// If the info dictionary lacks `name`, the file stem of `path` is used instead.
    pub fn read_from_file<P>(path: P) -> Result<TorrentMeta>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(RecoveryError::NotFound(path.to_path_buf()));
        }

        let fallback_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
        Self::from_parsed(BencodeElem::from_file(path)?, fallback_name)
    }

    fn from_parsed(mut parsed: Vec<BencodeElem>, fallback_name: Option<String>) -> Result<TorrentMeta> {
        if parsed.len() != 1 {
            return Err(RecoveryError::MalformedTorrent(Cow::Borrowed(
                "Torrent should contain 1 and only 1 top-level element.",
            )));
        }

        let mut root = match parsed.remove(0) {
            BencodeElem::Dictionary(dict) => dict,
            _ => {
                return Err(RecoveryError::MalformedTorrent(Cow::Borrowed(
                    "Torrent's top-level element is not a dictionary.",
                )))
            }
        };
        let mut info = match root.remove("info") {
            Some(BencodeElem::Dictionary(info)) => info,
            Some(_) => {
                return Err(RecoveryError::MalformedTorrent(Cow::Borrowed(
                    "\"info\" is not a dictionary.",
                )))
            }
            None => {
                return Err(RecoveryError::MalformedTorrent(Cow::Borrowed(
                    "\"info\" does not exist.",
                )))
            }
        };

        let name = Self::extract_name(&mut info, fallback_name)?;
        let version = Self::extract_version(&info);
        let (piece_length, pieces) = match version {
            TorrentVersion::V2 => (Self::extract_v2_piece_length(&mut info)?, Vec::new()),
            TorrentVersion::V1 | TorrentVersion::Hybrid => (
                Self::extract_piece_length(&mut info)?,
                Self::extract_pieces(&mut info)?,
            ),
        };
        let files = match version {
            TorrentVersion::V2 => Self::extract_file_tree(&mut info, &name)?,
            TorrentVersion::V1 | TorrentVersion::Hybrid => Self::extract_files(&mut info, &name)?,
        };

        Ok(TorrentMeta {
            name,
            files,
            piece_length,
            pieces,
            version,
        })
    }

    fn extract_name(dict: &mut Dictionary, fallback_name: Option<String>) -> Result<String> {
        match dict.remove("name") {
            Some(BencodeElem::String(name)) => Ok(name.nfc().collect()),
            Some(BencodeElem::Bytes(name)) => Ok(String::from_utf8_lossy(&name).nfc().collect()),
            Some(_) => Err(RecoveryError::MalformedTorrent(Cow::Borrowed(
                "\"name\" does not map to a string.",
            ))),
            None => fallback_name.ok_or(RecoveryError::MalformedTorrent(Cow::Borrowed(
                "\"name\" does not exist.",
            ))),
        }
    }

    fn extract_version(dict: &Dictionary) -> TorrentVersion {
        match dict.get("meta version") {
            Some(&BencodeElem::Integer(2)) => {
                if dict.contains_key("pieces") {
                    TorrentVersion::Hybrid
                } else {
                    TorrentVersion::V2
                }
            }
            _ => TorrentVersion::V1,
        }
    }

    fn extract_piece_length(dict: &mut Dictionary) -> Result<u64> {
        match dict.remove("piece length") {
            Some(BencodeElem::Integer(len)) => {
                if len > 0 {
                    util::i64_to_u64(len)
                } else {
                    Err(RecoveryError::MalformedTorrent(Cow::Borrowed(
                        "\"piece length\" <= 0.",
                    )))
                }
            }
            Some(_) => Err(RecoveryError::MalformedTorrent(Cow::Borrowed(
                "\"piece length\" does not map to an integer.",
            ))),
            None => Err(RecoveryError::MalformedTorrent(Cow::Borrowed(
                "\"piece length\" does not exist.",
            ))),
        }
    }

    fn extract_v2_piece_length(dict: &mut Dictionary) -> Result<u64> {
        if dict.contains_key("piece length") {
            Self::extract_piece_length(dict)
        } else {
            Ok(V2_DEFAULT_PIECE_LENGTH)
        }
    }

    fn extract_pieces(dict: &mut Dictionary) -> Result<Vec<Piece>> {
        match dict.remove("pieces") {
            Some(elem @ BencodeElem::Bytes(_)) | Some(elem @ BencodeElem::String(_)) => {
                let bytes = elem.as_bytes().unwrap_or(&[]);
                if bytes.is_empty() {
                    Err(RecoveryError::MalformedTorrent(Cow::Borrowed(
                        "\"pieces\" maps to an empty sequence.",
                    )))
                } else if (bytes.len() % PIECE_STRING_LENGTH) != 0 {
                    Err(RecoveryError::MalformedTorrent(Cow::Owned(format!(
                        "\"pieces\"' length is not a multiple of {}.",
                        PIECE_STRING_LENGTH,
                    ))))
                } else {
                    Ok(bytes
                        .chunks(PIECE_STRING_LENGTH)
                        .map(|chunk| chunk.to_vec())
                        .collect())
                }
            }
            Some(_) => Err(RecoveryError::MalformedTorrent(Cow::Borrowed(
                "\"pieces\" does not map to a sequence of bytes.",
            ))),
            None => Err(RecoveryError::MalformedTorrent(Cow::Borrowed(
                "\"pieces\" does not exist.",
            ))),
        }
    }

    fn extract_files(dict: &mut Dictionary, name: &str) -> Result<Vec<TorrentFile>> {
        match dict.remove("files") {
            Some(BencodeElem::List(list)) => {
                if list.is_empty() {
                    return Err(RecoveryError::MalformedTorrent(Cow::Borrowed(
                        "\"files\" maps to an empty list.",
                    )));
                }

                let mut files = Vec::with_capacity(list.len());
                let mut offset = 0;
                for elem in list {
                    let file = TorrentFile::extract_file(elem, offset)?;
                    offset = advance_offset(offset, file.length)?;
                    files.push(file);
                }
                Ok(files)
            }
            Some(_) => Err(RecoveryError::MalformedTorrent(Cow::Borrowed(
                "\"files\" does not map to a list.",
            ))),
            None => Self::extract_single_file(dict, name).map(|file| vec![file]),
        }
    }

    fn extract_file_tree(dict: &mut Dictionary, name: &str) -> Result<Vec<TorrentFile>> {
        match dict.remove("file tree") {
            Some(tree) => {
                let mut files = Vec::new();
                let mut offset = 0;
                walk_file_tree(&tree, &PathBuf::new(), &mut offset, &mut files)?;
                Ok(files)
            }
            None => Self::extract_single_file(dict, name).map(|file| vec![file]),
        }
    }

    // Single-file torrents name the file after the torrent itself.
    fn extract_single_file(dict: &Dictionary, name: &str) -> Result<TorrentFile> {
        Ok(TorrentFile {
            path: PathBuf::from(path_component(name.as_bytes())?),
            length: TorrentFile::extract_file_length(dict)?,
            offset: 0,
            sha1: TorrentFile::extract_sha1(dict),
            attr: TorrentFile::extract_attr(dict),
            symlink_path: TorrentFile::extract_symlink_path(dict),
        })
    }
}

fn walk_file_tree(
    node: &BencodeElem,
    prefix: &Path,
    offset: &mut u64,
    files: &mut Vec<TorrentFile>,
) -> Result<()> {
    let entries = node.sorted_entries().ok_or(RecoveryError::MalformedTorrent(
        Cow::Borrowed("\"file tree\" contains a non-dictionary node."),
    ))?;

    for (key, child) in entries {
        let path = prefix.join(path_component(key)?);
        let leaf = child
            .sorted_entries()
            .and_then(|entries| entries.into_iter().find(|(key, _)| key.is_empty()));

        match leaf {
            Some((_, BencodeElem::Dictionary(dict))) => {
                let file = TorrentFile::extract_tree_leaf(dict, path, *offset)?;
                *offset = advance_offset(*offset, file.length)?;
                files.push(file);
            }
            Some(_) => {
                return Err(RecoveryError::MalformedTorrent(Cow::Borrowed(
                    "\"file tree\" contains a leaf that is not a dictionary.",
                )))
            }
            None => walk_file_tree(child, &path, offset, files)?,
        }
    }
    Ok(())
}

// A missing length counts as 0.
fn advance_offset(offset: u64, length: Option<u64>) -> Result<u64> {
    offset
        .checked_add(length.unwrap_or(0))
        .ok_or(RecoveryError::MalformedTorrent(Cow::Borrowed(
            "Torrent's length overflowed in u64.",
        )))
}

fn path_component(bytes: &[u8]) -> Result<String> {
    let component: String = String::from_utf8_lossy(bytes).nfc().collect();
    // "Path components exactly matching '.' and '..' must be sanitized."
    if component.is_empty() || component == "." || component == ".." {
        Err(RecoveryError::MalformedTorrent(Cow::Borrowed(
            "\"path\" contains an empty, \".\" or \"..\" component.",
        )))
    } else {
        Ok(component)
    }
}

#[cfg(test)]
mod torrent_file_read_tests {
    // @note: `extract_file_length()` is not tested as it is
    // a thin wrapper around `i64_to_u64()`.
    use super::*;

    fn dict(elem: BencodeElem) -> Dictionary {
        match elem {
            BencodeElem::Dictionary(dict) => dict,
            _ => panic!("not a dictionary"),
        }
    }

    #[test]
    fn extract_file_ok() {
        let elem = bencode_elem!({ ("length", 42), ("path", ["dir1", "file.gz"]) });

        assert_eq!(
            TorrentFile::extract_file(elem, 7).unwrap(),
            TorrentFile {
                path: PathBuf::from("dir1/file.gz"),
                length: Some(42),
                offset: 7,
                sha1: None,
                attr: None,
                symlink_path: None,
            }
        );
    }

    #[test]
    fn extract_file_bep47_fields() {
        let sha1 = vec![0xab_u8; 20];
        let elem = bencode_elem!({
            ("length", 3),
            ("path", ["link"]),
            ("attr", "l"),
            ("symlink path", ["target", "file.gz"]),
        });
        let mut dict = dict(elem);
        dict.insert("sha1".to_owned(), BencodeElem::Bytes(sha1.clone()));

        let file = TorrentFile::extract_file(BencodeElem::Dictionary(dict), 0).unwrap();
        assert_eq!(file.sha1, Some(sha1));
        assert_eq!(file.attr, Some("l".to_owned()));
        assert_eq!(file.symlink_path, Some(PathBuf::from("target/file.gz")));
    }

    #[test]
    fn extract_file_not_dictionary() {
        match TorrentFile::extract_file(bencode_elem!(42), 0) {
            Err(RecoveryError::MalformedTorrent(_)) => (),
            _ => assert!(false),
        }
    }

    #[test]
    fn extract_file_length_missing() {
        let dict = dict(bencode_elem!({ ("path", ["a"]) }));
        assert_eq!(TorrentFile::extract_file_length(&dict).unwrap(), None);
    }

    #[test]
    fn extract_file_length_negative() {
        let negative = -1;
        let dict = dict(bencode_elem!({ ("length", negative) }));
        match TorrentFile::extract_file_length(&dict) {
            Err(RecoveryError::MalformedTorrent(m)) => assert_eq!(m, "\"length\" < 0."),
            _ => assert!(false),
        }
    }

    #[test]
    fn extract_file_path_nfc() {
        // "e" followed by a combining acute accent
        let dict = dict(bencode_elem!({ ("path", ["cafe\u{301}.gz"]) }));
        assert_eq!(
            TorrentFile::extract_file_path(&dict).unwrap(),
            PathBuf::from("caf\u{e9}.gz")
        );
    }

    #[test]
    fn extract_file_path_dot_dot() {
        let dict = dict(bencode_elem!({ ("path", ["..", "etc"]) }));
        match TorrentFile::extract_file_path(&dict) {
            Err(RecoveryError::MalformedTorrent(_)) => (),
            _ => assert!(false),
        }
    }

    #[test]
    fn extract_file_path_empty_list() {
        let dict = dict(bencode_elem!({ ("path", []) }));
        match TorrentFile::extract_file_path(&dict) {
            Err(RecoveryError::MalformedTorrent(m)) => {
                assert_eq!(m, "\"path\" maps to a 0-length list.")
            }
            _ => assert!(false),
        }
    }

    #[test]
    fn extract_file_path_non_string() {
        let dict = dict(bencode_elem!({ ("path", [1]) }));
        match TorrentFile::extract_file_path(&dict) {
            Err(RecoveryError::MalformedTorrent(_)) => (),
            _ => assert!(false),
        }
    }

    #[test]
    fn extract_sha1_wrong_length() {
        let dict = dict(bencode_elem!({ ("sha1", (0x01, 0x02)) }));
        assert_eq!(TorrentFile::extract_sha1(&dict), None);
    }
}
