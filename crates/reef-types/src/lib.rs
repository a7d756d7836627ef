//! Shared types for the Reef storage layer.
//!
//! This crate defines the identifier and message types used across the
//! Reef workspace: content digests ([`Digest`], [`HashAlgorithm`],
//! [`KeyFormat`]) and the action cache message family ([`ActionResult`],
//! [`OutputFile`], [`ExecutionMetadata`]).

mod action;
mod digest;

pub use action::{ActionResult, ExecutionMetadata, OutputFile};
pub use digest::{Digest, DigestError, HashAlgorithm, KeyFormat};
