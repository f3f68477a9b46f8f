//! Content hashing primitives
//!
//! Provides [`ContentHash`], a strongly-typed SHA-256 digest used for
//! scenario provenance and drift detection.

use crate::error::{DagError, Result};
use sha2::{Digest, Sha256};
use std::fmt::{self, Display, Formatter};
use std::path::Path;
use std::str::FromStr;

/// A 32-byte content hash (SHA-256)
///
/// Rendered as 64 lowercase hex characters in manifests and headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Compute SHA-256 of arbitrary data
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Hash the raw bytes of a file
    ///
    /// # Errors
    /// Returns [`DagError::Io`] if the file cannot be read
    pub fn of_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| DagError::io(path, e))?;
        Ok(Self::compute(&data))
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Errors parsing a hex-encoded hash, as read back from the compile manifest
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HashError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid hash length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

impl FromStr for ContentHash {
    type Err = HashError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| HashError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        let hash = ContentHash::compute(b"abc");
        assert_eq!(
            hash.to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hex_roundtrip() {
        let hash = ContentHash::compute(b"scenario");
        let parsed: ContentHash = hash.to_string().parse().unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn rejects_short_hex() {
        let err = "abcd".parse::<ContentHash>().unwrap_err();
        assert_eq!(
            err,
            HashError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn file_hash_matches_content_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "hello\n").unwrap();
        assert_eq!(
            ContentHash::of_file(&path).unwrap(),
            ContentHash::compute(b"hello\n")
        );
    }
}
