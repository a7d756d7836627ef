//! Action cache buffers: materialization and the deferred reader.
//!
//! Action cache entries are keyed by the digest of the action that
//! produced them, so their contents cannot be hash-checked. Validation
//! instead means two things: the stored length must match the declared
//! size, and the payload must decode as an [`ActionResult`]. An entry that
//! fails either check is as corrupt as a CAS blob with a bad checksum.

use async_trait::async_trait;
use bytes::Bytes;
use reef_types::{ActionResult, Digest};

use crate::action::decode_action_result;
use crate::cas::{read_all, ValidatedReader};
use crate::error::BufferError;
use crate::reader::{close_quietly, BytesReader, ReadCloser};
use crate::repair::RepairStrategy;

/// Read and validate a whole action cache payload.
///
/// `max_size` of `None` caps the read at the declared size alone. The
/// upstream is closed on every path out of here.
pub(crate) async fn materialize(
    digest: Digest,
    mut upstream: Box<dyn ReadCloser>,
    repair: RepairStrategy,
    max_size: Option<usize>,
) -> Result<(Bytes, ActionResult), BufferError> {
    if let Some(max) = max_size {
        if digest.size_bytes() > max as u64 {
            close_quietly(upstream.as_mut()).await;
            return Err(BufferError::MaximumSizeExceeded {
                size: digest.size_bytes(),
                max: max as u64,
            });
        }
    }

    let mut reader = ValidatedReader::size_only(&digest, upstream, repair);
    let data = match read_all(&mut reader, digest.size_bytes() as usize).await {
        Ok(data) => data,
        Err(error) => {
            let _ = reader.close().await;
            return Err(error);
        }
    };
    let repair = reader.take_repair();
    reader.close().await?;

    match decode_action_result(&data) {
        Ok(message) => Ok((data, message)),
        Err(error) => {
            // A stored entry that does not decode is corrupt, unlike the
            // CAS path where a decode failure only means the caller asked
            // for the wrong message type.
            repair.fire(&error);
            Err(error)
        }
    }
}

/// Reader handed out by `into_reader` for action cache buffers.
///
/// Handing out the reader itself must stay I/O-free, so materialization is
/// postponed to the first read. Errors are sticky.
pub(crate) struct DeferredBytesReader {
    source: Option<(Digest, Box<dyn ReadCloser>, RepairStrategy)>,
    inner: Option<BytesReader>,
    failure: Option<BufferError>,
}

impl DeferredBytesReader {
    pub(crate) fn new(
        digest: Digest,
        upstream: Box<dyn ReadCloser>,
        repair: RepairStrategy,
    ) -> Self {
        Self {
            source: Some((digest, upstream, repair)),
            inner: None,
            failure: None,
        }
    }
}

#[async_trait]
impl ReadCloser for DeferredBytesReader {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, BufferError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        if self.inner.is_none() {
            let Some((digest, upstream, repair)) = self.source.take() else {
                return Ok(0);
            };
            match materialize(digest, upstream, repair, None).await {
                Ok((data, _)) => self.inner = Some(BytesReader::new(data)),
                Err(error) => {
                    self.failure = Some(error.clone());
                    return Err(error);
                }
            }
        }
        let Some(inner) = self.inner.as_mut() else {
            return Ok(0);
        };
        inner.read(buf).await
    }

    async fn close(&mut self) -> Result<(), BufferError> {
        match self.source.take() {
            Some((_, mut upstream, _)) => upstream.close().await,
            None => Ok(()),
        }
    }
}
