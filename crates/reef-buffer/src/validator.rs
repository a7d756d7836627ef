//! Incremental validation of blob contents against a declared digest.

use std::fmt::Write;

use digest::DynDigest;
use reef_types::Digest;

use crate::error::BufferError;

/// Accumulates blob bytes and checks them against a declared [`Digest`].
///
/// Size checks take precedence over hash checks: a stream of the wrong
/// length reports a size error, never a checksum error.
pub struct DigestValidator {
    expected: Digest,
    hasher: Box<dyn DynDigest + Send>,
    observed: u64,
    check_hash: bool,
}

impl DigestValidator {
    /// Validator checking both length and content hash.
    pub fn new(digest: &Digest) -> Self {
        Self {
            expected: digest.clone(),
            hasher: digest.new_hasher(),
            observed: 0,
            check_hash: true,
        }
    }

    /// Validator checking length only.
    ///
    /// Action cache entries are keyed by the digest of the action that
    /// produced them, not of the stored payload, so their hash can never
    /// match the contents.
    pub fn size_only(digest: &Digest) -> Self {
        Self {
            check_hash: false,
            ..Self::new(digest)
        }
    }

    /// Feed a chunk of blob data.
    pub fn absorb(&mut self, chunk: &[u8]) {
        if self.check_hash {
            self.hasher.update(chunk);
        }
        self.observed += chunk.len() as u64;
    }

    /// Number of bytes absorbed so far.
    pub fn observed(&self) -> u64 {
        self.observed
    }

    /// Fail as soon as more bytes than the declared size have been seen.
    ///
    /// This fires before end of stream, so an oversized blob is rejected
    /// without draining it; the error reports the count observed so far.
    pub fn check_within_declared(&self) -> Result<(), BufferError> {
        let expected = self.expected.size_bytes();
        if self.observed > expected {
            return Err(BufferError::SizeExceeded {
                observed: self.observed,
                expected,
            });
        }
        Ok(())
    }

    /// Run the end-of-stream checks.
    pub fn finish(&mut self) -> Result<(), BufferError> {
        let expected = self.expected.size_bytes();
        if self.observed != expected {
            return Err(BufferError::SizeMismatch {
                actual: self.observed,
                expected,
            });
        }
        if self.check_hash {
            let actual = hex_encode(&self.hasher.finalize_reset());
            if actual != self.expected.hash_hex() {
                return Err(BufferError::ChecksumMismatch {
                    actual,
                    expected: self.expected.hash_hex().to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Validate a complete in-memory blob against its digest.
pub(crate) fn validate_full(digest: &Digest, data: &[u8]) -> Result<(), BufferError> {
    let mut validator = DigestValidator::new(digest);
    validator.absorb(data);
    validator.finish()
}

pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
