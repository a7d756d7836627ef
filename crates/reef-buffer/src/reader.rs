//! The upstream reader contract and the simple reader shapes buffers hand
//! out.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::BufferError;

/// A closeable sequential byte source.
///
/// `read` returning `Ok(0)` signals end of stream. A buffer assumes
/// exclusive ownership of its upstream and closes it exactly once on every
/// exit path; implementations must tolerate `close` being called more than
/// once. Reads may block (await) indefinitely — deadlines belong to the
/// upstream itself.
#[async_trait]
pub trait ReadCloser: Send {
    /// Read up to `buf.len()` bytes into the front of `buf`.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, BufferError>;

    /// Release the underlying resource.
    async fn close(&mut self) -> Result<(), BufferError>;
}

/// Close a reader whose close error has nowhere meaningful to go.
pub(crate) async fn close_quietly(reader: &mut dyn ReadCloser) {
    if let Err(error) = reader.close().await {
        debug!(error = %error, "upstream close failed");
    }
}

/// Reader over an in-memory payload.
pub(crate) struct BytesReader {
    data: Bytes,
    pos: usize,
}

impl BytesReader {
    pub(crate) fn new(data: Bytes) -> Self {
        Self { data, pos: 0 }
    }
}

#[async_trait]
impl ReadCloser for BytesReader {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, BufferError> {
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    async fn close(&mut self) -> Result<(), BufferError> {
        Ok(())
    }
}

/// Reader that replays a fixed error on every read.
pub(crate) struct ErrorReader {
    error: BufferError,
}

impl ErrorReader {
    pub(crate) fn new(error: BufferError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl ReadCloser for ErrorReader {
    async fn read(&mut self, _buf: &mut [u8]) -> Result<usize, BufferError> {
        Err(self.error.clone())
    }

    async fn close(&mut self) -> Result<(), BufferError> {
        Ok(())
    }
}
