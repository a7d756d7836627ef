//! The buffer error surface.
//!
//! Every failure a buffer can report is a structured (code, message)
//! pair. The message strings are a stable contract: the storage layer's
//! tests assert on them verbatim and operators grep for them, so they
//! must not drift.

use std::io;
use std::sync::Arc;

/// Coarse classification of a [`BufferError`], mirroring the status codes
/// used at the RPC boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The caller asked for something nonsensical; retrying is pointless.
    InvalidArgument,
    /// The stored blob or the backend misbehaved.
    Internal,
}

/// Errors reported by buffer terminal operations.
///
/// Cloneable so that streaming readers can replay the same error on every
/// call after the first failure, and so that both halves of a fork can
/// share one materialization outcome.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BufferError {
    /// A read was requested at a negative offset.
    #[error("Negative read offset: {offset}")]
    NegativeOffset {
        /// The offending offset.
        offset: i64,
    },

    /// The blob is larger than the caller is willing to hold in memory.
    #[error("Buffer is {size} bytes in size, while a maximum of {max} bytes is permitted")]
    MaximumSizeExceeded {
        /// Declared size of the blob.
        size: u64,
        /// Limit supplied by the caller.
        max: u64,
    },

    /// A read was requested at an offset past the end of the blob.
    #[error("Buffer is {size} bytes in size, while a read at offset {offset} was requested")]
    OffsetOutOfBounds {
        /// Declared size of the blob.
        size: u64,
        /// The offending offset.
        offset: i64,
    },

    /// The stream ended with a byte count different from the declared size.
    #[error("Buffer is {actual} bytes in size, while {expected} bytes were expected")]
    SizeMismatch {
        /// Bytes actually observed.
        actual: u64,
        /// Bytes the digest declared.
        expected: u64,
    },

    /// The stream produced more bytes than the declared size before ending.
    #[error("Buffer is at least {observed} bytes in size, while {expected} bytes were expected")]
    SizeExceeded {
        /// Bytes observed when the overrun was detected.
        observed: u64,
        /// Bytes the digest declared.
        expected: u64,
    },

    /// The content hash disagrees with the declared digest.
    #[error("Buffer has checksum {actual}, while {expected} was expected")]
    ChecksumMismatch {
        /// Hash of the bytes actually observed, as lowercase hex.
        actual: String,
        /// Hash the digest declared.
        expected: String,
    },

    /// The payload could not be decoded as the expected message type.
    #[error("Failed to unmarshal message: {0}")]
    Decode(String),

    /// An upstream I/O error, passed through verbatim.
    #[error("{0}")]
    Io(Arc<io::Error>),
}

impl BufferError {
    /// The status code this error maps to at the RPC boundary.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NegativeOffset { .. }
            | Self::MaximumSizeExceeded { .. }
            | Self::OffsetOutOfBounds { .. }
            | Self::Decode(_) => ErrorCode::InvalidArgument,
            Self::SizeMismatch { .. }
            | Self::SizeExceeded { .. }
            | Self::ChecksumMismatch { .. }
            | Self::Io(_) => ErrorCode::Internal,
        }
    }

    /// Whether this error means the stored blob itself is bad.
    ///
    /// Argument errors and transient upstream failures are not corruption:
    /// the blob may be perfectly fine. Only corruption errors may trigger
    /// reparation.
    pub fn is_data_corruption(&self) -> bool {
        matches!(
            self,
            Self::SizeMismatch { .. } | Self::SizeExceeded { .. } | Self::ChecksumMismatch { .. }
        )
    }
}

impl From<io::Error> for BufferError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
