//! The buffer: a one-shot polymorphic carrier of a blob.

use bytes::Bytes;
use reef_types::{ActionResult, Digest};
use tokio::io::AsyncWrite;
use tracing::debug;

use crate::ac::{self, DeferredBytesReader};
use crate::action::decode_action_result;
use crate::cas::{copy_to_writer, read_all, read_window, ValidatedReader};
use crate::chunk::{BytesChunkReader, ChunkPolicy, ChunkReader, StreamingChunkReader};
use crate::error::BufferError;
use crate::reader::{close_quietly, BytesReader, ErrorReader, ReadCloser};
use crate::repair::RepairStrategy;
use crate::validator::validate_full;

/// A one-shot carrier of a single blob.
///
/// A buffer is consumed by exactly one terminal operation; every terminal
/// operation takes `self`, so a second consumption is a compile error.
/// Whatever path the consumption takes (success, failure, or
/// [`Buffer::discard`]), the upstream reader is closed exactly once.
/// Dropping an unconsumed buffer falls back to the upstream's own drop
/// behaviour; prefer `discard`.
pub struct Buffer {
    kind: Kind,
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer").finish_non_exhaustive()
    }
}

/// The closed set of buffer shapes. No open extension: every terminal
/// operation matches exhaustively on this.
enum Kind {
    /// Contents already known to be correct.
    Validated { data: Bytes },
    /// CAS blob behind a sequential upstream; validated while streaming.
    CasReader {
        digest: Digest,
        reader: Box<dyn ReadCloser>,
        repair: RepairStrategy,
    },
    /// CAS blob already in memory; validated on first consumption.
    CasBytes {
        digest: Digest,
        data: Bytes,
        repair: RepairStrategy,
    },
    /// Action cache entry behind a sequential upstream; materialized in
    /// full on demand.
    AcReader {
        digest: Digest,
        reader: Box<dyn ReadCloser>,
        repair: RepairStrategy,
    },
    /// A failure captured as a buffer, replayed on consumption.
    Error { error: BufferError },
}

impl Buffer {
    /// Buffer over contents that have already been validated.
    pub fn from_validated_bytes(data: impl Into<Bytes>) -> Self {
        Self {
            kind: Kind::Validated { data: data.into() },
        }
    }

    /// CAS buffer over a sequential upstream reader.
    ///
    /// Takes exclusive ownership of `reader`; no I/O happens until a
    /// terminal operation runs.
    pub fn cas_from_reader(
        digest: Digest,
        reader: Box<dyn ReadCloser>,
        repair: RepairStrategy,
    ) -> Self {
        Self {
            kind: Kind::CasReader {
                digest,
                reader,
                repair,
            },
        }
    }

    /// CAS buffer over an in-memory payload that has not been verified
    /// against its digest yet.
    pub fn cas_from_bytes(
        digest: Digest,
        data: impl Into<Bytes>,
        repair: RepairStrategy,
    ) -> Self {
        Self {
            kind: Kind::CasBytes {
                digest,
                data: data.into(),
                repair,
            },
        }
    }

    /// Action cache buffer over a sequential upstream reader.
    pub fn ac_from_reader(
        digest: Digest,
        reader: Box<dyn ReadCloser>,
        repair: RepairStrategy,
    ) -> Self {
        Self {
            kind: Kind::AcReader {
                digest,
                reader,
                repair,
            },
        }
    }

    /// Action cache buffer over an in-memory payload.
    pub fn ac_from_bytes(
        digest: Digest,
        data: impl Into<Bytes>,
        repair: RepairStrategy,
    ) -> Self {
        Self::ac_from_reader(digest, Box::new(BytesReader::new(data.into())), repair)
    }

    /// Buffer that reports `error` to whoever consumes it.
    pub fn from_error(error: BufferError) -> Self {
        Self {
            kind: Kind::Error { error },
        }
    }

    /// Declared size of the blob in bytes.
    ///
    /// Non-consuming; never touches the upstream.
    pub fn size_bytes(&self) -> Result<u64, BufferError> {
        match &self.kind {
            Kind::Validated { data } => Ok(data.len() as u64),
            Kind::CasReader { digest, .. }
            | Kind::CasBytes { digest, .. }
            | Kind::AcReader { digest, .. } => Ok(digest.size_bytes()),
            Kind::Error { error } => Err(error.clone()),
        }
    }

    /// Drop the blob without validating it, closing the upstream.
    pub async fn discard(self) {
        match self.kind {
            Kind::CasReader { mut reader, .. } | Kind::AcReader { mut reader, .. } => {
                if let Err(error) = reader.close().await {
                    debug!(error = %error, "upstream close failed during discard");
                }
            }
            Kind::Validated { .. } | Kind::CasBytes { .. } | Kind::Error { .. } => {}
        }
    }

    /// Stream the whole blob into `writer`.
    ///
    /// Ends with the first upstream error, writer error, or validation
    /// failure; on validation failure the trailing bytes are withheld.
    pub async fn into_writer<W>(self, writer: &mut W) -> Result<(), BufferError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut reader = self.into_reader();
        match copy_to_writer(reader.as_mut(), writer).await {
            Ok(()) => reader.close().await,
            Err(error) => {
                close_quietly(reader.as_mut()).await;
                Err(error)
            }
        }
    }

    /// The whole blob as one contiguous payload.
    ///
    /// Fails up front, without touching the upstream, when the declared
    /// size exceeds `max_size`.
    pub async fn into_bytes(self, max_size: usize) -> Result<Bytes, BufferError> {
        match self.kind {
            Kind::Validated { data } => {
                check_max_size(data.len() as u64, max_size)?;
                Ok(data)
            }
            Kind::CasBytes {
                digest,
                data,
                repair,
            } => {
                check_max_size(data.len() as u64, max_size)?;
                match validate_full(&digest, &data) {
                    Ok(()) => Ok(data),
                    Err(error) => {
                        repair.notify(&error);
                        Err(error)
                    }
                }
            }
            Kind::CasReader {
                digest,
                mut reader,
                repair,
            } => {
                if let Err(error) = check_max_size(digest.size_bytes(), max_size) {
                    close_quietly(reader.as_mut()).await;
                    return Err(error);
                }
                let mut reader = ValidatedReader::new(&digest, reader, repair);
                match read_all(&mut reader, digest.size_bytes() as usize).await {
                    Ok(data) => {
                        reader.close().await?;
                        Ok(data)
                    }
                    Err(error) => {
                        let _ = reader.close().await;
                        Err(error)
                    }
                }
            }
            Kind::AcReader {
                digest,
                reader,
                repair,
            } => {
                let (data, _) = ac::materialize(digest, reader, repair, Some(max_size)).await?;
                Ok(data)
            }
            Kind::Error { error } => Err(error),
        }
    }

    /// The blob decoded as an [`ActionResult`].
    pub async fn into_action_result(
        self,
        max_size: usize,
    ) -> Result<ActionResult, BufferError> {
        match self.kind {
            Kind::AcReader {
                digest,
                reader,
                repair,
            } => {
                let (_, message) =
                    ac::materialize(digest, reader, repair, Some(max_size)).await?;
                Ok(message)
            }
            kind => {
                let data = Buffer { kind }.into_bytes(max_size).await?;
                decode_action_result(&data)
            }
        }
    }

    /// Random-access read into `buf` at `offset`.
    ///
    /// Emulated on top of the sequential upstream: the prefix is read and
    /// dropped, the window served, and the suffix drained so validation
    /// always runs to completion. Returns the number of bytes written into
    /// `buf`; fewer than `buf.len()` means the blob ended inside the
    /// window, zero means `offset` was at or past the end. On a validation
    /// failure the caller gets the error and no bytes, even when the
    /// window itself had been read in full.
    pub async fn read_at(self, buf: &mut [u8], offset: i64) -> Result<usize, BufferError> {
        if offset < 0 {
            let error = BufferError::NegativeOffset { offset };
            self.discard().await;
            return Err(error);
        }
        let offset = offset as u64;
        match self.kind {
            Kind::Validated { data } => Ok(read_from_slice(&data, buf, offset)),
            Kind::CasBytes {
                digest,
                data,
                repair,
            } => match validate_full(&digest, &data) {
                Ok(()) => Ok(read_from_slice(&data, buf, offset)),
                Err(error) => {
                    repair.notify(&error);
                    Err(error)
                }
            },
            Kind::CasReader {
                digest,
                reader,
                repair,
            } => {
                let mut reader = ValidatedReader::new(&digest, reader, repair);
                match read_window(&mut reader, buf, offset).await {
                    Ok(n) => {
                        reader.close().await?;
                        Ok(n)
                    }
                    Err(error) => {
                        let _ = reader.close().await;
                        Err(error)
                    }
                }
            }
            Kind::AcReader {
                digest,
                reader,
                repair,
            } => {
                let (data, _) = ac::materialize(digest, reader, repair, None).await?;
                Ok(read_from_slice(&data, buf, offset))
            }
            Kind::Error { error } => Err(error),
        }
    }

    /// Sequential reader over the blob.
    ///
    /// The reader validates as it goes: the bytes of a corrupt blob's
    /// final read are withheld and the error replayed on every subsequent
    /// read. `close` closes the upstream.
    pub fn into_reader(self) -> Box<dyn ReadCloser> {
        match self.kind {
            Kind::Validated { data } => Box::new(BytesReader::new(data)),
            Kind::CasReader {
                digest,
                reader,
                repair,
            } => Box::new(ValidatedReader::new(&digest, reader, repair)),
            Kind::CasBytes {
                digest,
                data,
                repair,
            } => match validate_full(&digest, &data) {
                Ok(()) => Box::new(BytesReader::new(data)),
                Err(error) => {
                    repair.notify(&error);
                    Box::new(ErrorReader::new(error))
                }
            },
            Kind::AcReader {
                digest,
                reader,
                repair,
            } => Box::new(DeferredBytesReader::new(digest, reader, repair)),
            Kind::Error { error } => Box::new(ErrorReader::new(error)),
        }
    }

    /// Chunked reader over the blob, starting at `offset`.
    ///
    /// `offset` must lie within `0..=size`; violations surface on the
    /// first `next_chunk` call.
    pub fn into_chunk_reader(self, offset: i64, policy: ChunkPolicy) -> Box<dyn ChunkReader> {
        match self.kind {
            Kind::Validated { data } => {
                let offset = chunk_offset(data.len() as u64, offset);
                Box::new(BytesChunkReader::new(data, offset, policy))
            }
            Kind::CasBytes {
                digest,
                data,
                repair,
            } => {
                let offset = chunk_offset(digest.size_bytes(), offset);
                match offset {
                    Err(error) => Box::new(BytesChunkReader::new(data, Err(error), policy)),
                    Ok(offset) => match validate_full(&digest, &data) {
                        Ok(()) => Box::new(BytesChunkReader::new(data, Ok(offset), policy)),
                        Err(error) => {
                            repair.notify(&error);
                            Box::new(BytesChunkReader::invalid(error, policy))
                        }
                    },
                }
            }
            Kind::CasReader {
                digest,
                reader,
                repair,
            } => {
                let offset = chunk_offset(digest.size_bytes(), offset);
                let source = Box::new(ValidatedReader::new(&digest, reader, repair));
                Box::new(StreamingChunkReader::new(source, offset, policy))
            }
            Kind::AcReader {
                digest,
                reader,
                repair,
            } => {
                let offset = chunk_offset(digest.size_bytes(), offset);
                let source = Box::new(DeferredBytesReader::new(digest, reader, repair));
                Box::new(StreamingChunkReader::new(source, offset, policy))
            }
            Kind::Error { error } => Box::new(BytesChunkReader::invalid(error, policy)),
        }
    }

    /// Split into two buffers that both yield this blob's contents.
    ///
    /// Reader-backed contents are materialized here, once; both halves
    /// share the resulting payload (or the resulting error), so either can
    /// be consumed first, or both concurrently, with the same outcome.
    /// Repair fires at most once across the pair.
    pub async fn fork(self, max_size: usize) -> (Buffer, Buffer) {
        match self.kind {
            Kind::Validated { data } => (
                Buffer::from_validated_bytes(data.clone()),
                Buffer::from_validated_bytes(data),
            ),
            Kind::Error { error } => (
                Buffer::from_error(error.clone()),
                Buffer::from_error(error),
            ),
            kind => match (Buffer { kind }).into_bytes(max_size).await {
                Ok(data) => (
                    Buffer::from_validated_bytes(data.clone()),
                    Buffer::from_validated_bytes(data),
                ),
                Err(error) => (
                    Buffer::from_error(error.clone()),
                    Buffer::from_error(error),
                ),
            },
        }
    }
}

fn check_max_size(size: u64, max_size: usize) -> Result<(), BufferError> {
    if size > max_size as u64 {
        return Err(BufferError::MaximumSizeExceeded {
            size,
            max: max_size as u64,
        });
    }
    Ok(())
}

fn chunk_offset(size: u64, offset: i64) -> Result<u64, BufferError> {
    if offset < 0 {
        return Err(BufferError::NegativeOffset { offset });
    }
    if offset as u64 > size {
        return Err(BufferError::OffsetOutOfBounds { size, offset });
    }
    Ok(offset as u64)
}

fn read_from_slice(data: &[u8], buf: &mut [u8], offset: u64) -> usize {
    if offset >= data.len() as u64 {
        return 0;
    }
    let start = offset as usize;
    let n = buf.len().min(data.len() - start);
    buf[..n].copy_from_slice(&data[start..start + n]);
    n
}
