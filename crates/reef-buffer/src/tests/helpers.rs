//! Shared fakes and fixtures for buffer tests.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use digest::DynDigest;
use reef_types::{ActionResult, Digest, ExecutionMetadata, HashAlgorithm};

use crate::validator::hex_encode;
use crate::{encode_action_result, BufferError, ReadCloser, RepairStrategy};

/// md5("Hello"), size 5.
pub(crate) fn hello_digest() -> Digest {
    Digest::new("foo", "8b1a9953c4611296a827abf8c47804d7", 5).unwrap()
}

/// md5("Hello world"), size 11.
pub(crate) fn hello_world_digest() -> Digest {
    Digest::new("foo", "3e25960a79dbc69b674cd4ec67a72c62", 11).unwrap()
}

/// MD5 digest of `data` under the given instance name.
pub(crate) fn md5_digest(instance: &str, data: &[u8]) -> Digest {
    let mut hasher = HashAlgorithm::Md5.new_hasher();
    hasher.update(data);
    Digest::new(instance, hex_encode(&hasher.finalize_reset()), data.len() as u64).unwrap()
}

/// A representative action result and its encoded payload.
pub(crate) fn sample_action_result() -> (ActionResult, Bytes) {
    let result = ActionResult {
        exit_code: 7,
        execution_metadata: ExecutionMetadata {
            worker: "worker-3".to_string(),
            queued_micros: 150,
            execution_micros: 8200,
        },
        ..ActionResult::default()
    };
    let bytes = encode_action_result(&result).unwrap();
    (result, bytes)
}

/// Upstream fake yielding a fixed payload, with close counting.
pub(crate) struct FakeReader {
    data: Vec<u8>,
    pos: usize,
    closes: Arc<AtomicUsize>,
}

impl FakeReader {
    pub(crate) fn new(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            pos: 0,
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counter incremented on every close call.
    pub(crate) fn closes(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }
}

#[async_trait]
impl ReadCloser for FakeReader {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, BufferError> {
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    async fn close(&mut self) -> Result<(), BufferError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Upstream fake that fails with an I/O error on its first read.
pub(crate) struct BrokenReader {
    message: &'static str,
    closes: Arc<AtomicUsize>,
}

impl BrokenReader {
    pub(crate) fn new(message: &'static str) -> Self {
        Self {
            message,
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn closes(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }
}

#[async_trait]
impl ReadCloser for BrokenReader {
    async fn read(&mut self, _buf: &mut [u8]) -> Result<usize, BufferError> {
        Err(BufferError::from(io::Error::other(self.message)))
    }

    async fn close(&mut self) -> Result<(), BufferError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Repair strategy that counts its invocations.
pub(crate) fn counting_repair(digest: &Digest) -> (RepairStrategy, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let calls = Arc::clone(&count);
    let strategy = RepairStrategy::reparable(digest.clone(), move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    (strategy, count)
}

/// Shorthand for asserting an atomic counter.
pub(crate) fn count_of(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}

/// `AsyncWrite` collecting everything into a vector.
#[derive(Default)]
pub(crate) struct CollectWriter {
    pub(crate) data: Vec<u8>,
}

impl tokio::io::AsyncWrite for CollectWriter {
    fn poll_write(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<io::Result<usize>> {
        self.get_mut().data.extend_from_slice(buf);
        std::task::Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn poll_shutdown(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        std::task::Poll::Ready(Ok(()))
    }
}

/// `AsyncWrite` that rejects every write.
pub(crate) struct RejectingWriter;

impl tokio::io::AsyncWrite for RejectingWriter {
    fn poll_write(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        _buf: &[u8],
    ) -> std::task::Poll<io::Result<usize>> {
        std::task::Poll::Ready(Err(io::Error::other("writer rejected the data")))
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn poll_shutdown(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        std::task::Poll::Ready(Ok(()))
    }
}
