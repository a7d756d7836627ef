//! In-memory blob store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use reef_buffer::{Buffer, RepairStrategy};
use reef_types::{Digest, KeyFormat};
use tracing::debug;

use crate::error::StoreError;
use crate::factory::{ActionCacheBufferFactory, BlobStore, CasBufferFactory, ReadBufferFactory};

/// In-memory blob store backed by a `RwLock<HashMap>`.
///
/// Useful for testing and for caches configured to run in memory-only
/// mode. Buffers returned by `get` carry a reparation strategy that
/// evicts the entry, so a blob that turns out to be corrupt disappears
/// the first time anyone consumes it.
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, Bytes>>>,
    factory: Box<dyn ReadBufferFactory>,
    key_format: KeyFormat,
    max_blob_size: usize,
}

impl MemoryBlobStore {
    /// Store for content-addressed blobs.
    pub fn cas(key_format: KeyFormat, max_blob_size: usize) -> Self {
        Self::with_factory(Box::new(CasBufferFactory), key_format, max_blob_size)
    }

    /// Store for action cache entries.
    pub fn action_cache(key_format: KeyFormat, max_blob_size: usize) -> Self {
        Self::with_factory(Box::new(ActionCacheBufferFactory), key_format, max_blob_size)
    }

    fn with_factory(
        factory: Box<dyn ReadBufferFactory>,
        key_format: KeyFormat,
        max_blob_size: usize,
    ) -> Self {
        Self {
            blobs: Arc::new(RwLock::new(HashMap::new())),
            factory,
            key_format,
            max_blob_size,
        }
    }

    /// Overwrite an entry without validation (for testing purposes).
    #[cfg(test)]
    pub(crate) fn insert_raw(&self, digest: &Digest, data: Bytes) {
        self.blobs
            .write()
            .expect("lock poisoned")
            .insert(digest.key(self.key_format), data);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, digest: &Digest) -> Result<Buffer, StoreError> {
        let key = digest.key(self.key_format);
        let data = self
            .blobs
            .read()
            .expect("lock poisoned")
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(digest.clone()))?;

        let blobs = Arc::clone(&self.blobs);
        let repair = RepairStrategy::reparable(digest.clone(), move |bad| {
            debug!(digest = %bad, "evicting corrupt blob");
            blobs.write().expect("lock poisoned").remove(&key);
            Ok(())
        });
        Ok(self.factory.buffer_from_bytes(digest, data, repair))
    }

    async fn put(&self, digest: &Digest, buffer: Buffer) -> Result<(), StoreError> {
        let data = buffer.into_bytes(self.max_blob_size).await?;
        debug!(digest = %digest, size = data.len(), "storing blob");
        self.blobs
            .write()
            .expect("lock poisoned")
            .insert(digest.key(self.key_format), data);
        Ok(())
    }

    async fn contains(&self, digest: &Digest) -> Result<bool, StoreError> {
        Ok(self
            .blobs
            .read()
            .expect("lock poisoned")
            .contains_key(&digest.key(self.key_format)))
    }
}
