//! The CAS reader pipeline: sequential consumption of a non-restartable
//! upstream with inline validation.
//!
//! The upstream can only be read once, front to back, so every access
//! shape (full slice, random-access window, chunk iteration) is built on
//! one primitive: a [`ReadCloser`] that forwards the upstream through a
//! [`DigestValidator`] and refuses to release the final bytes of a blob
//! that turns out to be corrupt.

use async_trait::async_trait;
use bytes::Bytes;
use reef_types::Digest;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::BufferError;
use crate::reader::ReadCloser;
use crate::repair::RepairStrategy;
use crate::validator::DigestValidator;

/// Read size for prefix and suffix bytes the consumer did not ask for but
/// validation still has to see.
pub(crate) const DISCARD_READ_SIZE: usize = 16 * 1024;

/// A [`ReadCloser`] that validates an upstream while forwarding it.
///
/// When the declared byte count is reached mid-read, the upstream is
/// probed for end of stream and the digest checked before the bytes are
/// released; a consumer of a corrupt blob never observes its full
/// contents. After any failure the error is replayed on every subsequent
/// read and the upstream has already been closed, which also covers
/// failures detected before the first read. On the success path the
/// upstream stays open until [`ReadCloser::close`], whose error is then
/// the consumer's to see.
pub(crate) struct ValidatedReader {
    upstream: Box<dyn ReadCloser>,
    validator: DigestValidator,
    declared: u64,
    repair: RepairStrategy,
    done: bool,
    failure: Option<BufferError>,
    upstream_closed: bool,
}

impl ValidatedReader {
    pub(crate) fn new(
        digest: &Digest,
        upstream: Box<dyn ReadCloser>,
        repair: RepairStrategy,
    ) -> Self {
        Self::with_validator(DigestValidator::new(digest), digest, upstream, repair)
    }

    /// Length checking without hash checking, for action cache payloads.
    pub(crate) fn size_only(
        digest: &Digest,
        upstream: Box<dyn ReadCloser>,
        repair: RepairStrategy,
    ) -> Self {
        Self::with_validator(DigestValidator::size_only(digest), digest, upstream, repair)
    }

    fn with_validator(
        validator: DigestValidator,
        digest: &Digest,
        upstream: Box<dyn ReadCloser>,
        repair: RepairStrategy,
    ) -> Self {
        Self {
            upstream,
            validator,
            declared: digest.size_bytes(),
            repair,
            done: false,
            failure: None,
            upstream_closed: false,
        }
    }

    /// Take the repair strategy out, for corruption checks that happen
    /// after the stream itself validated (action cache decoding).
    pub(crate) fn take_repair(&mut self) -> RepairStrategy {
        std::mem::replace(&mut self.repair, RepairStrategy::Irreparable)
    }

    /// Enter the sticky failure state: fire repair for corruption errors,
    /// close the upstream, remember the error.
    async fn fail(&mut self, error: BufferError) -> BufferError {
        self.take_repair().notify(&error);
        if !self.upstream_closed {
            self.upstream_closed = true;
            if let Err(close_error) = self.upstream.close().await {
                debug!(error = %close_error, "upstream close failed");
            }
        }
        self.failure = Some(error.clone());
        error
    }
}

#[async_trait]
impl ReadCloser for ValidatedReader {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, BufferError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        if self.done || buf.is_empty() {
            return Ok(0);
        }

        let n = match self.upstream.read(buf).await {
            Ok(n) => n,
            Err(error) => return Err(self.fail(error).await),
        };
        if n == 0 {
            if let Err(error) = self.validator.finish() {
                return Err(self.fail(error).await);
            }
            self.done = true;
            return Ok(0);
        }

        self.validator.absorb(&buf[..n]);
        if let Err(error) = self.validator.check_within_declared() {
            return Err(self.fail(error).await);
        }

        if self.validator.observed() == self.declared {
            // The declared count has been reached. Probe for end of stream
            // and finish validation before releasing this final chunk.
            let mut probe = [0u8; 1];
            let extra = match self.upstream.read(&mut probe).await {
                Ok(extra) => extra,
                Err(error) => return Err(self.fail(error).await),
            };
            if extra > 0 {
                self.validator.absorb(&probe[..extra]);
                let error = BufferError::SizeExceeded {
                    observed: self.validator.observed(),
                    expected: self.declared,
                };
                return Err(self.fail(error).await);
            }
            if let Err(error) = self.validator.finish() {
                return Err(self.fail(error).await);
            }
            self.done = true;
        }
        Ok(n)
    }

    async fn close(&mut self) -> Result<(), BufferError> {
        if self.upstream_closed {
            return Ok(());
        }
        self.upstream_closed = true;
        self.upstream.close().await
    }
}

/// Drive `reader` to completion, collecting exactly the declared number of
/// bytes.
pub(crate) async fn read_all(
    reader: &mut ValidatedReader,
    declared: usize,
) -> Result<Bytes, BufferError> {
    let mut data = vec![0u8; declared];
    let mut filled = 0;
    while filled < declared {
        let n = reader.read(&mut data[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    data.truncate(filled);
    // Confirm end of stream; for an empty blob this is also what runs
    // validation in the first place.
    let mut probe = [0u8; 1];
    reader.read(&mut probe).await?;
    Ok(Bytes::from(data))
}

/// Serve a random-access window from a sequential reader: discard the
/// prefix, fill `buf`, then drain the suffix so validation runs to
/// completion.
///
/// Returns the number of bytes written into `buf`; fewer than `buf.len()`
/// (or zero, for an offset at or past the end) means the blob ended inside
/// or before the window.
pub(crate) async fn read_window(
    reader: &mut ValidatedReader,
    buf: &mut [u8],
    offset: u64,
) -> Result<usize, BufferError> {
    let mut scratch = vec![0u8; DISCARD_READ_SIZE];

    let mut remaining = offset;
    while remaining > 0 {
        let len = remaining.min(DISCARD_READ_SIZE as u64) as usize;
        let n = reader.read(&mut scratch[..len]).await?;
        if n == 0 {
            return Ok(0);
        }
        remaining -= n as u64;
    }

    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Ok(filled);
        }
        filled += n;
    }

    loop {
        let n = reader.read(&mut scratch).await?;
        if n == 0 {
            return Ok(filled);
        }
    }
}

/// Copy a whole stream into an async writer.
pub(crate) async fn copy_to_writer<W>(
    reader: &mut dyn ReadCloser,
    writer: &mut W,
) -> Result<(), BufferError>
where
    W: AsyncWrite + Unpin,
{
    let mut chunk = vec![0u8; DISCARD_READ_SIZE];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        writer
            .write_all(&chunk[..n])
            .await
            .map_err(BufferError::from)?;
    }
}
