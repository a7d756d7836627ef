//! Chunked access to blob contents.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::BufferError;
use crate::reader::ReadCloser;

/// How a consumer wants a blob split into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkPolicy {
    /// Chunks of at most `n` bytes; the reader may yield less.
    AtMost(usize),
    /// Chunks of exactly `n` bytes, except possibly the final one.
    Exactly(usize),
}

impl ChunkPolicy {
    /// The read size handed to the underlying source.
    fn read_size(self) -> usize {
        match self {
            Self::AtMost(n) | Self::Exactly(n) => n,
        }
    }
}

/// Iterator over the chunks of a blob.
///
/// Yielded chunks are never empty. `Ok(None)` signals the end of the
/// stream and keeps being returned on further calls; errors are sticky in
/// the same way.
#[async_trait]
pub trait ChunkReader: Send {
    /// The next chunk, or `Ok(None)` at end of stream.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, BufferError>;

    /// Release the underlying resource. Idempotent.
    async fn close(&mut self);
}

/// Chunk reader over a sequential byte source.
///
/// Offset preconditions are checked by the buffer before construction; a
/// violation is parked in `pending_error` and surfaced on the first call,
/// at which point the source is closed.
pub(crate) struct StreamingChunkReader {
    source: Box<dyn ReadCloser>,
    policy: ChunkPolicy,
    /// Prefix bytes still to be read and dropped before the first chunk.
    /// They flow through the source so validation sees every byte.
    discard: u64,
    pending_error: Option<BufferError>,
    failure: Option<BufferError>,
    done: bool,
    closed: bool,
}

impl StreamingChunkReader {
    pub(crate) fn new(
        source: Box<dyn ReadCloser>,
        offset: Result<u64, BufferError>,
        policy: ChunkPolicy,
    ) -> Self {
        let (discard, pending_error) = match offset {
            Ok(offset) => (offset, None),
            Err(error) => (0, Some(error)),
        };
        Self {
            source,
            policy,
            discard,
            pending_error,
            failure: None,
            done: false,
            closed: false,
        }
    }

    async fn fail(&mut self, error: BufferError) -> BufferError {
        self.close().await;
        self.failure = Some(error.clone());
        error
    }
}

#[async_trait]
impl ChunkReader for StreamingChunkReader {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, BufferError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        if self.done {
            return Ok(None);
        }
        if let Some(error) = self.pending_error.take() {
            return Err(self.fail(error).await);
        }

        let read_size = self.policy.read_size();
        if read_size == 0 {
            self.done = true;
            return Ok(None);
        }

        let mut scratch = vec![0u8; read_size];
        while self.discard > 0 {
            let len = self.discard.min(read_size as u64) as usize;
            let n = match self.source.read(&mut scratch[..len]).await {
                Ok(n) => n,
                Err(error) => return Err(self.fail(error).await),
            };
            if n == 0 {
                self.done = true;
                return Ok(None);
            }
            self.discard -= n as u64;
        }

        match self.policy {
            ChunkPolicy::AtMost(_) => {
                let n = match self.source.read(&mut scratch).await {
                    Ok(n) => n,
                    Err(error) => return Err(self.fail(error).await),
                };
                if n == 0 {
                    self.done = true;
                    return Ok(None);
                }
                scratch.truncate(n);
                Ok(Some(Bytes::from(scratch)))
            }
            ChunkPolicy::Exactly(_) => {
                let mut filled = 0;
                while filled < read_size {
                    let n = match self.source.read(&mut scratch[filled..]).await {
                        Ok(n) => n,
                        Err(error) => return Err(self.fail(error).await),
                    };
                    if n == 0 {
                        self.done = true;
                        break;
                    }
                    filled += n;
                }
                if filled == 0 {
                    return Ok(None);
                }
                scratch.truncate(filled);
                Ok(Some(Bytes::from(scratch)))
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(error) = self.source.close().await {
            debug!(error = %error, "chunk reader close failed");
        }
    }
}

/// Chunk reader over an in-memory payload, slicing without copying.
///
/// With the whole payload at hand, `AtMost` and `Exactly` coincide: every
/// chunk is the full chunk size except the final one.
pub(crate) struct BytesChunkReader {
    data: Bytes,
    pos: usize,
    policy: ChunkPolicy,
    pending_error: Option<BufferError>,
    failure: Option<BufferError>,
}

impl BytesChunkReader {
    pub(crate) fn new(
        data: Bytes,
        offset: Result<u64, BufferError>,
        policy: ChunkPolicy,
    ) -> Self {
        let (pos, pending_error) = match offset {
            Ok(offset) => (offset as usize, None),
            Err(error) => (0, Some(error)),
        };
        Self {
            data,
            pos,
            policy,
            pending_error,
            failure: None,
        }
    }

    /// Reader that only ever reports `error`.
    pub(crate) fn invalid(error: BufferError, policy: ChunkPolicy) -> Self {
        Self::new(Bytes::new(), Err(error), policy)
    }
}

#[async_trait]
impl ChunkReader for BytesChunkReader {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, BufferError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        if let Some(error) = self.pending_error.take() {
            self.failure = Some(error.clone());
            return Err(error);
        }
        let read_size = self.policy.read_size();
        if self.pos >= self.data.len() || read_size == 0 {
            return Ok(None);
        }
        let take = read_size.min(self.data.len() - self.pos);
        let chunk = self.data.slice(self.pos..self.pos + take);
        self.pos += take;
        Ok(Some(chunk))
    }

    async fn close(&mut self) {}
}
