//! Content digests: the authoritative identity of a stored blob.

use std::fmt;

use digest::DynDigest;
use serde::{Deserialize, Serialize};

/// Hash algorithms accepted for content digests.
///
/// Digests never carry the algorithm explicitly; it is inferred from the
/// length of the hex hash string, so every algorithm must have a distinct
/// output width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Infer the algorithm from the length of a hex hash string.
    pub fn from_hex_length(len: usize) -> Option<Self> {
        match len {
            32 => Some(Self::Md5),
            40 => Some(Self::Sha1),
            64 => Some(Self::Sha256),
            96 => Some(Self::Sha384),
            128 => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Length of this algorithm's output in hex characters.
    pub fn hex_length(self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha1 => 40,
            Self::Sha256 => 64,
            Self::Sha384 => 96,
            Self::Sha512 => 128,
        }
    }

    /// Construct a fresh incremental hasher for this algorithm.
    pub fn new_hasher(self) -> Box<dyn DynDigest + Send> {
        match self {
            Self::Md5 => Box::new(md5::Md5::default()),
            Self::Sha1 => Box::new(sha1::Sha1::default()),
            Self::Sha256 => Box::new(sha2::Sha256::default()),
            Self::Sha384 => Box::new(sha2::Sha384::default()),
            Self::Sha512 => Box::new(sha2::Sha512::default()),
        }
    }
}

/// How a digest is rendered as a flat storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFormat {
    /// `{hash}-{size}`: for backends shared across instances.
    HashOnly,
    /// `{hash}-{size}-{instance}`: for backends that partition per instance.
    HashAndInstance,
}

/// Errors produced when constructing a [`Digest`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DigestError {
    /// The hash string's length matches no supported algorithm.
    #[error("unknown hash length: {0} hex characters")]
    UnknownHashLength(usize),

    /// The hash string contains something other than lowercase hex.
    #[error("invalid hash character: {0:?}")]
    InvalidHashCharacter(char),
}

/// Identity of a blob: instance name, content hash, and exact size.
///
/// The size is authoritative — a stored blob whose length disagrees with
/// its digest is corrupt no matter what its hash says. Equality is
/// structural across all three fields.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest {
    instance: String,
    hash: String,
    size_bytes: u64,
}

impl Digest {
    /// Create a digest, validating the hash string.
    ///
    /// The hash must be lowercase hex with a length matching one of the
    /// supported algorithms.
    pub fn new(
        instance: impl Into<String>,
        hash: impl Into<String>,
        size_bytes: u64,
    ) -> Result<Self, DigestError> {
        let hash = hash.into();
        if HashAlgorithm::from_hex_length(hash.len()).is_none() {
            return Err(DigestError::UnknownHashLength(hash.len()));
        }
        if let Some(c) = hash.chars().find(|c| !matches!(c, '0'..='9' | 'a'..='f')) {
            return Err(DigestError::InvalidHashCharacter(c));
        }
        Ok(Self {
            instance: instance.into(),
            hash,
            size_bytes,
        })
    }

    /// The instance name this blob is routed under.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// The content hash as lowercase hex.
    pub fn hash_hex(&self) -> &str {
        &self.hash
    }

    /// Declared size of the blob in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// The hash algorithm, inferred from the hash width.
    pub fn algorithm(&self) -> HashAlgorithm {
        match self.hash.len() {
            32 => HashAlgorithm::Md5,
            40 => HashAlgorithm::Sha1,
            64 => HashAlgorithm::Sha256,
            96 => HashAlgorithm::Sha384,
            _ => HashAlgorithm::Sha512,
        }
    }

    /// A fresh hasher matching this digest's algorithm.
    pub fn new_hasher(&self) -> Box<dyn DynDigest + Send> {
        self.algorithm().new_hasher()
    }

    /// Render this digest as a flat storage key.
    pub fn key(&self, format: KeyFormat) -> String {
        match format {
            KeyFormat::HashOnly => format!("{}-{}", self.hash, self.size_bytes),
            KeyFormat::HashAndInstance => {
                format!("{}-{}-{}", self.hash, self.size_bytes, self.instance)
            }
        }
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.hash, self.size_bytes, self.instance)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({self})")
    }
}
