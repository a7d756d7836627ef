//! The action result message stored in the action cache.
//!
//! At the buffer layer an action result is just a blob with a known
//! decoding; these types give it that decoding. Serialized with postcard
//! wherever it is stored or sent.

use serde::{Deserialize, Serialize};

use crate::Digest;

/// Outcome of a remotely executed action.
///
/// Large outputs are not embedded: stdout, stderr and output files are
/// referenced by CAS digest so the result itself stays small.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Exit code of the action's process.
    pub exit_code: i32,
    /// Files the action produced, with their CAS digests.
    pub output_files: Vec<OutputFile>,
    /// CAS digest of captured stdout, if any was captured.
    pub stdout_digest: Option<Digest>,
    /// CAS digest of captured stderr, if any was captured.
    pub stderr_digest: Option<Digest>,
    /// Timing information recorded by the worker.
    pub execution_metadata: ExecutionMetadata,
}

/// A single file produced by an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFile {
    /// Path relative to the action's working directory.
    pub path: String,
    /// CAS digest of the file contents.
    pub digest: Digest,
    /// Whether the file had its executable bit set.
    pub is_executable: bool,
}

/// Timing information for one execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    /// Identifier of the worker that ran the action.
    pub worker: String,
    /// Time spent queued before execution, in microseconds.
    pub queued_micros: u64,
    /// Wall time of the execution itself, in microseconds.
    pub execution_micros: u64,
}
