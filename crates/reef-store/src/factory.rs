//! Buffer factories and the blob store trait.

use async_trait::async_trait;
use bytes::Bytes;
use reef_buffer::{Buffer, ReadCloser, RepairStrategy};
use reef_types::Digest;

use crate::error::StoreError;

/// Produces [`Buffer`] values for payloads coming out of a backend.
///
/// The factory picks the buffer variant appropriate for what the backend
/// stores: CAS blobs get content validation, action cache entries get
/// size and decode validation.
pub trait ReadBufferFactory: Send + Sync {
    /// Buffer over a payload the backend already holds in memory.
    fn buffer_from_bytes(
        &self,
        digest: &Digest,
        data: Bytes,
        repair: RepairStrategy,
    ) -> Buffer;

    /// Buffer over a sequential reader handed out by the backend.
    fn buffer_from_reader(
        &self,
        digest: &Digest,
        reader: Box<dyn ReadCloser>,
        repair: RepairStrategy,
    ) -> Buffer;
}

/// Factory for content-addressed blobs.
pub struct CasBufferFactory;

impl ReadBufferFactory for CasBufferFactory {
    fn buffer_from_bytes(
        &self,
        digest: &Digest,
        data: Bytes,
        repair: RepairStrategy,
    ) -> Buffer {
        Buffer::cas_from_bytes(digest.clone(), data, repair)
    }

    fn buffer_from_reader(
        &self,
        digest: &Digest,
        reader: Box<dyn ReadCloser>,
        repair: RepairStrategy,
    ) -> Buffer {
        Buffer::cas_from_reader(digest.clone(), reader, repair)
    }
}

/// Factory for action cache entries.
pub struct ActionCacheBufferFactory;

impl ReadBufferFactory for ActionCacheBufferFactory {
    fn buffer_from_bytes(
        &self,
        digest: &Digest,
        data: Bytes,
        repair: RepairStrategy,
    ) -> Buffer {
        Buffer::ac_from_bytes(digest.clone(), data, repair)
    }

    fn buffer_from_reader(
        &self,
        digest: &Digest,
        reader: Box<dyn ReadCloser>,
        repair: RepairStrategy,
    ) -> Buffer {
        Buffer::ac_from_reader(digest.clone(), reader, repair)
    }
}

/// A blob backend addressed by digest.
///
/// All implementations must be `Send + Sync` for use across async tasks.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch a blob. The returned buffer validates contents on consumption.
    async fn get(&self, digest: &Digest) -> Result<Buffer, StoreError>;

    /// Store a blob, consuming (and thereby validating) its buffer.
    async fn put(&self, digest: &Digest, buffer: Buffer) -> Result<(), StoreError>;

    /// Whether a blob is present under the given digest.
    async fn contains(&self, digest: &Digest) -> Result<bool, StoreError>;
}
