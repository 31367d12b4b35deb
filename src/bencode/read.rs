//! Bencode decoding.

use super::*;
use crate::util::{self, ByteBuffer};
use crate::{RecoveryError, Result};
use std::borrow::Cow;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str;

/// Lists and dictionaries nested deeper than this are rejected.
const MAX_DEPTH: usize = 64;

struct Decoder<'a> {
    input: ByteBuffer<'a>,
    depth: usize,
}

impl BencodeElem {
    /// Parse `bytes` and return every top-level element in order.
    ///
    /// Empty input yields an empty `Vec`. Malformed input fails with
    /// `MalformedBencode`, whose message carries the offending byte offset.
    pub fn from_bytes<B>(bytes: B) -> Result<Vec<BencodeElem>>
    where
        B: AsRef<[u8]>,
    {
        let mut decoder = Decoder {
            input: ByteBuffer::new(bytes.as_ref()),
            depth: 0,
        };
        let mut elements = Vec::new();
        while !decoder.input.is_empty() {
            elements.push(decoder.element()?);
        }
        Ok(elements)
    }

    /// Parse the content of the file at `path`.
    pub fn from_file<P>(path: P) -> Result<Vec<BencodeElem>>
    where
        P: AsRef<Path>,
    {
        let mut bytes = Vec::new();
        util::open_file(path.as_ref())?.read_to_end(&mut bytes)?;
        Self::from_bytes(bytes)
    }
}

fn malformed<M>(position: usize, what: M) -> RecoveryError
where
    M: fmt::Display,
{
    RecoveryError::MalformedBencode(Cow::Owned(format!("{} at byte {}.", what, position)))
}

impl<'a> Decoder<'a> {
    fn element(&mut self) -> Result<BencodeElem> {
        match self.input.peek() {
            Some(DICTIONARY_PREFIX) => self.nested(Self::dictionary),
            Some(LIST_PREFIX) => self.nested(Self::list),
            Some(INTEGER_PREFIX) => {
                self.input.advance(1);
                self.integer(INTEGER_POSTFIX).map(BencodeElem::Integer)
            }
            Some(b'0'..=b'9') => Ok(match String::from_utf8(self.string()?) {
                Ok(string) => BencodeElem::String(string),
                Err(e) => BencodeElem::Bytes(e.into_bytes()),
            }),
            Some(byte) => Err(malformed(self.input.pos(), format_args!("Unexpected byte {:#04x}", byte))),
            None => Err(malformed(self.input.pos(), "Unexpected end of input")),
        }
    }

    // Consume the prefix and decode a container one level deeper.
    fn nested(&mut self, decode: fn(&mut Decoder<'a>) -> Result<BencodeElem>) -> Result<BencodeElem> {
        if self.depth >= MAX_DEPTH {
            return Err(malformed(self.input.pos(), "Nesting too deep"));
        }
        self.input.advance(1);
        self.depth += 1;
        let elem = decode(self);
        self.depth -= 1;
        elem
    }

    // Items up to `postfix`, which is consumed.
    fn until_postfix<T, F>(&mut self, postfix: u8, mut item: F) -> Result<Vec<T>>
    where
        F: FnMut(&mut Decoder<'a>) -> Result<T>,
    {
        let mut items = Vec::new();
        loop {
            match self.input.peek() {
                Some(byte) if byte == postfix => {
                    self.input.advance(1);
                    return Ok(items);
                }
                Some(_) => items.push(item(self)?),
                None => return Err(malformed(self.input.pos(), "Unterminated list or dictionary")),
            }
        }
    }

    fn list(&mut self) -> Result<BencodeElem> {
        self.until_postfix(LIST_POSTFIX, Self::element)
            .map(BencodeElem::List)
    }

    fn dictionary(&mut self) -> Result<BencodeElem> {
        let start = self.input.pos();
        let entries =
            self.until_postfix(DICTIONARY_POSTFIX, |decoder| Ok((decoder.string()?, decoder.element()?)))?;

        // keys are sorted as raw byte strings
        if entries.windows(2).any(|pair| pair[0].0 > pair[1].0) {
            return Err(malformed(start, "Unsorted dictionary keys"));
        }

        if entries.iter().all(|(key, _)| str::from_utf8(key).is_ok()) {
            Ok(BencodeElem::Dictionary(
                entries
                    .into_iter()
                    .filter_map(|(key, val)| String::from_utf8(key).ok().map(|key| (key, val)))
                    .collect(),
            ))
        } else {
            Ok(BencodeElem::RawDictionary(entries.into_iter().collect()))
        }
    }

    // Digits up to `delimiter`, in canonical form: no leading zeros, no "-0".
    fn integer(&mut self, delimiter: u8) -> Result<i64> {
        let start = self.input.pos();
        let digits = self
            .input
            .take_until(delimiter)
            .ok_or_else(|| malformed(start, "Unterminated integer"))?;
        let text = str::from_utf8(digits).map_err(|_| malformed(start, "Non-ASCII integer"))?;

        let canonical = match text.strip_prefix('-') {
            Some(magnitude) => !magnitude.starts_with('0'),
            None => text == "0" || !text.starts_with('0'),
        };
        if !canonical {
            return Err(malformed(start, format_args!("Non-canonical integer {:?}", text)));
        }
        text.parse()
            .map_err(|_| malformed(start, format_args!("Invalid integer {:?}", text)))
    }

    fn string(&mut self) -> Result<Vec<u8>> {
        let start = self.input.pos();
        let len = self.integer(STRING_DELIMITER)?;
        let len = util::i64_to_usize(len).map_err(|_| malformed(start, "Negative string length"))?;
        self.input
            .take_exact(len)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| malformed(start, "String shorter than its declared length"))
    }
}
