//! One-shot validated blob buffers for the Reef storage layer.
//!
//! A [`Buffer`] carries a single blob from a backend to a consumer. It is
//! consumed by exactly one terminal operation (whole payload, streaming
//! reader, chunk reader, random-access window, writer copy, or a fork
//! into two handles), and on the way through, the contents are checked
//! against their declared [`reef_types::Digest`]. When a stored blob
//! turns out to be corrupt, the buffer's [`RepairStrategy`] decides
//! whether anyone is told about it.
//!
//! The hard case is a blob behind a non-restartable sequential upstream
//! ([`ReadCloser`]): the buffer enforces the declared length and checksum
//! without buffering more than the consumer's chosen access shape needs,
//! emulates random access by discarding prefixes through the validator,
//! and guarantees the upstream is closed exactly once on every exit path.

mod ac;
mod action;
mod buffer;
mod cas;
mod chunk;
mod error;
mod reader;
mod repair;
mod validator;

pub use action::encode_action_result;
pub use buffer::Buffer;
pub use chunk::{ChunkPolicy, ChunkReader};
pub use error::{BufferError, ErrorCode};
pub use reader::ReadCloser;
pub use repair::{RepairError, RepairFn, RepairStrategy};
pub use validator::DigestValidator;

#[cfg(test)]
mod tests;
