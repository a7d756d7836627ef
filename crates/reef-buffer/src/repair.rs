//! Corruption notification.
//!
//! When a buffer discovers that its stored blob is corrupt, someone has to
//! be told so the blob can be deleted or refetched. The [`RepairStrategy`]
//! carried by a buffer decides whether that happens.

use std::error::Error;

use reef_types::Digest;
use tracing::warn;

use crate::error::BufferError;

/// Error type a repair callback may return. Logged, never propagated to
/// the buffer's consumer.
pub type RepairError = Box<dyn Error + Send + Sync>;

/// Callback informing the storage layer that a blob is corrupt.
pub type RepairFn = Box<dyn FnOnce(&Digest) -> Result<(), RepairError> + Send>;

/// What to do when a buffer detects that its blob is corrupt.
pub enum RepairStrategy {
    /// Report the error to the consumer; take no further action.
    Irreparable,
    /// Additionally invoke a callback so the blob can be dealt with.
    Reparable {
        /// The digest the corrupt blob is stored under.
        digest: Digest,
        /// Invoked at most once per buffer.
        callback: RepairFn,
    },
}

impl RepairStrategy {
    /// A [`RepairStrategy::Reparable`] from a plain closure.
    pub fn reparable(
        digest: Digest,
        callback: impl FnOnce(&Digest) -> Result<(), RepairError> + Send + 'static,
    ) -> Self {
        Self::Reparable {
            digest,
            callback: Box::new(callback),
        }
    }

    /// Fire the callback if `error` denotes data corruption.
    ///
    /// Consumes the strategy. Callers that stay alive after a failure must
    /// leave [`RepairStrategy::Irreparable`] in its place, which is what
    /// makes the at-most-once guarantee hold.
    pub(crate) fn notify(self, error: &BufferError) {
        if error.is_data_corruption() {
            self.fire(error);
        }
    }

    /// Fire the callback regardless of the error's classification.
    ///
    /// Used on the action cache path, where a payload that fails to decode
    /// is corrupt even though decode errors are argument errors elsewhere.
    pub(crate) fn fire(self, error: &BufferError) {
        if let Self::Reparable { digest, callback } = self {
            warn!(digest = %digest, error = %error, "blob failed validation, notifying repairer");
            if let Err(callback_error) = callback(&digest) {
                warn!(digest = %digest, error = %callback_error, "repair callback failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    fn digest() -> Digest {
        Digest::new("foo", "8b1a9953c4611296a827abf8c47804d7", 5).unwrap()
    }

    fn counting() -> (RepairStrategy, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let calls = Arc::clone(&count);
        let strategy = RepairStrategy::reparable(digest(), move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (strategy, count)
    }

    #[test]
    fn test_notify_fires_on_corruption() {
        let (strategy, count) = counting();
        strategy.notify(&BufferError::SizeMismatch {
            actual: 3,
            expected: 5,
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_notify_skips_io_errors() {
        let (strategy, count) = counting();
        strategy.notify(&BufferError::from(std::io::Error::other("flaky disk")));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_notify_skips_argument_errors() {
        let (strategy, count) = counting();
        strategy.notify(&BufferError::NegativeOffset { offset: -1 });
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_callback_failure_is_swallowed() {
        let strategy = RepairStrategy::reparable(digest(), |_| Err("repair queue full".into()));
        strategy.notify(&BufferError::SizeMismatch {
            actual: 3,
            expected: 5,
        });
    }

    #[test]
    fn test_irreparable_does_nothing() {
        RepairStrategy::Irreparable.notify(&BufferError::SizeMismatch {
            actual: 3,
            expected: 5,
        });
    }
}
