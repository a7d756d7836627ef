//! Error types for blob store operations.

use reef_buffer::BufferError;
use reef_types::Digest;

/// Errors that can occur during blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No blob is stored under the requested digest.
    #[error("blob not found: {0}")]
    NotFound(Digest),

    /// The blob's buffer reported a failure.
    #[error(transparent)]
    Buffer(#[from] BufferError),
}
