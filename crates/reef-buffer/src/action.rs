//! Wire encoding of [`ActionResult`] messages.

use std::io;

use bytes::Bytes;
use reef_types::ActionResult;

use crate::error::BufferError;

/// Serialize an action result into its stored wire form.
pub fn encode_action_result(result: &ActionResult) -> Result<Bytes, BufferError> {
    postcard::to_allocvec(result)
        .map(Bytes::from)
        .map_err(|e| BufferError::from(io::Error::other(e)))
}

/// Decode a stored payload as an [`ActionResult`].
pub(crate) fn decode_action_result(data: &[u8]) -> Result<ActionResult, BufferError> {
    postcard::from_bytes(data).map_err(|e| BufferError::Decode(e.to_string()))
}
