//! Blob storage surface built on top of buffers.
//!
//! This crate defines how the rest of the system obtains and hands back
//! blobs:
//!
//! - [`ReadBufferFactory`] — produces [`reef_buffer::Buffer`] values for
//!   payloads coming out of a backend, picking the buffer variant per
//!   storage type ([`CasBufferFactory`], [`ActionCacheBufferFactory`]).
//! - [`BlobStore`] — the narrow async get/put/contains surface.
//! - [`MemoryBlobStore`] — an in-memory backend whose `get` wires up
//!   reparation: consuming a corrupt blob evicts it.

mod error;
mod factory;
mod memory;

pub use error::StoreError;
pub use factory::{ActionCacheBufferFactory, BlobStore, CasBufferFactory, ReadBufferFactory};
pub use memory::MemoryBlobStore;
