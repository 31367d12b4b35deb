//! Module for bencode-related parsing/encoding.
//!
//! Only what the torrent reader needs is kept here: decoding into [`BencodeElem`]
//! and encoding it back (used to assemble `.torrent` fixtures).
//!
//! [`BencodeElem`]: enum.BencodeElem.html

use std::collections::HashMap;

#[macro_use]
mod macros;
mod read;
mod write;

const DICTIONARY_PREFIX: u8 = b'd';
const DICTIONARY_POSTFIX: u8 = b'e';
const LIST_PREFIX: u8 = b'l';
const LIST_POSTFIX: u8 = b'e';
const INTEGER_PREFIX: u8 = b'i';
const INTEGER_POSTFIX: u8 = b'e';
const STRING_DELIMITER: u8 = b':';

/// Represent a single bencode element.
///
/// Strings that are not valid UTF-8 are kept as `Bytes`. Likewise, a
/// dictionary with any non-UTF-8 key is kept as a `RawDictionary`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BencodeElem {
    String(String),
    Bytes(Vec<u8>),
    Integer(i64),
    List(Vec<BencodeElem>),
    Dictionary(HashMap<String, BencodeElem>),
    RawDictionary(HashMap<Vec<u8>, BencodeElem>),
}

impl BencodeElem {
    /// Borrow the raw bytes of a `String` or `Bytes` element.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match *self {
            BencodeElem::String(ref string) => Some(string.as_bytes()),
            BencodeElem::Bytes(ref bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Entries of a `Dictionary` or `RawDictionary`, sorted
    /// by raw key bytes (i.e. the order they are encoded in).
    pub fn sorted_entries(&self) -> Option<Vec<(&[u8], &BencodeElem)>> {
        let mut entries: Vec<(&[u8], &BencodeElem)> = match *self {
            BencodeElem::Dictionary(ref dict) => {
                dict.iter().map(|(k, v)| (k.as_bytes(), v)).collect()
            }
            BencodeElem::RawDictionary(ref dict) => {
                dict.iter().map(|(k, v)| (k.as_slice(), v)).collect()
            }
            _ => return None,
        };
        entries.sort_by_key(|&(key, _)| key);
        Some(entries)
    }
}

macro_rules! integer_from {
    ($($int:ty),*) => {
        $(
            impl From<$int> for BencodeElem {
                fn from(val: $int) -> BencodeElem {
                    BencodeElem::Integer(i64::from(val))
                }
            }
        )*
    };
}

integer_from!(u8, u16, u32, i8, i16, i32, i64);

impl From<&str> for BencodeElem {
    fn from(val: &str) -> BencodeElem {
        BencodeElem::String(val.to_owned())
    }
}

impl From<String> for BencodeElem {
    fn from(val: String) -> BencodeElem {
        BencodeElem::String(val)
    }
}

impl From<&[u8]> for BencodeElem {
    fn from(val: &[u8]) -> BencodeElem {
        BencodeElem::Bytes(val.to_vec())
    }
}

impl From<Vec<u8>> for BencodeElem {
    fn from(val: Vec<u8>) -> BencodeElem {
        BencodeElem::Bytes(val)
    }
}

#[cfg(test)]
mod bencode_elem_tests {
    use super::*;

    #[test]
    fn as_bytes_ok() {
        assert_eq!(bencode_elem!("spam").as_bytes(), Some(&b"spam"[..]));
        assert_eq!(bencode_elem!((0xff, 0x00)).as_bytes(), Some(&[0xff, 0x00][..]));
        assert_eq!(bencode_elem!(4).as_bytes(), None);
    }

    #[test]
    fn sorted_entries_dictionary() {
        let dict = bencode_elem!({ ("zoo", 1), ("ark", 2) });
        let keys: Vec<&[u8]> = dict.sorted_entries().unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![&b"ark"[..], &b"zoo"[..]]);
    }

    #[test]
    fn sorted_entries_raw_dictionary() {
        let dict = bencode_elem!(r{ ([0xff], 1), ([b'a'], 2) });
        let entries = dict.sorted_entries().unwrap();
        assert_eq!(entries[0], (&b"a"[..], &bencode_elem!(2)));
        assert_eq!(entries[1], (&[0xff][..], &bencode_elem!(1)));
    }

    #[test]
    fn sorted_entries_not_dictionary() {
        assert_eq!(bencode_elem!([1]).sorted_entries(), None);
    }
}
