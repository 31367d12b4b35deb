//! Bencode encoding.

use super::*;
use crate::Result;
use std::io::Write;

// <len>:<bytes>
fn write_string<W>(bytes: &[u8], dst: &mut W) -> Result<()>
where
    W: Write,
{
    write!(dst, "{}:", bytes.len())?;
    dst.write_all(bytes)?;
    Ok(())
}

impl BencodeElem {
    /// Encode `self` into `dst`. Dictionary keys are written in raw byte order.
    pub fn write_into<W>(&self, dst: &mut W) -> Result<()>
    where
        W: Write,
    {
        match *self {
            BencodeElem::String(ref string) => write_string(string.as_bytes(), dst),
            BencodeElem::Bytes(ref bytes) => write_string(bytes, dst),
            BencodeElem::Integer(int) => {
                write!(dst, "i{}e", int)?;
                Ok(())
            }
            BencodeElem::List(ref list) => {
                dst.write_all(&[LIST_PREFIX])?;
                list.iter().try_for_each(|item| item.write_into(dst))?;
                dst.write_all(&[LIST_POSTFIX])?;
                Ok(())
            }
            BencodeElem::Dictionary(_) | BencodeElem::RawDictionary(_) => {
                dst.write_all(&[DICTIONARY_PREFIX])?;
                for (key, val) in self.sorted_entries().unwrap_or_default() {
                    write_string(key, dst)?;
                    val.write_into(dst)?;
                }
                dst.write_all(&[DICTIONARY_POSTFIX])?;
                Ok(())
            }
        }
    }

    /// Encode `self` into a fresh `Vec`.
    pub fn encode(&self) -> Vec<u8> {
        let mut encoded = Vec::new();
        // writes into a `Vec` are infallible
        let _ = self.write_into(&mut encoded);
        encoded
    }
}
