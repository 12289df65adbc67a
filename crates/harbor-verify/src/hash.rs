use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{AnyHasher, Result, VerifyError};

/// Digest algorithms understood by the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Sha1,
    Sha256,
}

impl Algorithm {
    /// Digest length in bytes.
    pub fn digest_len(self) -> usize {
        match self {
            Algorithm::Sha1 => 20,
            Algorithm::Sha256 => 32,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Sha1 => write!(f, "sha1"),
            Algorithm::Sha256 => write!(f, "sha256"),
        }
    }
}

/// Expected content digest of a file.
///
/// Parsed from lowercase or uppercase hex; the algorithm follows from the
/// digest length, so manifests that only carry a bare `sha1` string work
/// without extra metadata.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash {
    algorithm: Algorithm,
    digest:    Vec<u8>,
}

impl ContentHash {
    pub fn from_hex(s: &str) -> Result<Self> { s.parse() }

    pub fn algorithm(&self) -> Algorithm { self.algorithm }

    pub fn as_bytes(&self) -> &[u8] { &self.digest }

    /// Fresh incremental hasher for this digest's algorithm.
    pub fn hasher(&self) -> AnyHasher { AnyHasher::new(self.algorithm) }

    pub fn matches(&self, actual: &[u8]) -> bool { self.digest == actual }

    /// Compare a finalized digest, reporting both sides in hex on mismatch.
    pub fn verify(&self, actual: &[u8]) -> Result<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(VerifyError::Mismatch {
                expected: self.to_string(),
                actual:   hex::encode(actual),
            })
        }
    }
}

impl FromStr for ContentHash {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let algorithm = match s.len() {
            40 => Algorithm::Sha1,
            64 => Algorithm::Sha256,
            _ => return Err(VerifyError::InvalidDigest(s.to_string())),
        };
        let digest = hex::decode(s).map_err(|_| VerifyError::InvalidDigest(s.to_string()))?;

        Ok(Self { algorithm, digest })
    }
}

impl TryFrom<String> for ContentHash {
    type Error = VerifyError;

    fn try_from(s: String) -> Result<Self> { s.parse() }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self { hash.to_string() }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.digest))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self)
    }
}
