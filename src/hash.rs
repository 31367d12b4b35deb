//! Piece digests.

use sha1::{Digest, Sha1};
use sha2::Sha256;
use std::fmt;

/// Digest used to fingerprint a piece.
///
/// v1 torrents hash pieces with SHA-1; SHA-256 is available for callers
/// matching against v2-style digests.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum HashAlgorithm {
    #[default]
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha1 => sha1_piece(data),
            HashAlgorithm::Sha256 => sha256_piece(data),
        }
    }

    /// Length of the digest in bytes.
    pub fn output_len(self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            HashAlgorithm::Sha1 => write!(f, "sha1"),
            HashAlgorithm::Sha256 => write!(f, "sha256"),
        }
    }
}

pub fn sha1_piece(data: &[u8]) -> Vec<u8> {
    Sha1::digest(data).to_vec()
}

pub fn sha256_piece(data: &[u8]) -> Vec<u8> {
    Sha256::digest(data).to_vec()
}
