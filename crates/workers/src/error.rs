//! Error taxonomy shared by workers and the pool

use crate::worker::WorkerHandle;

/// Errors returned by worker and pool operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkerError {
    /// `start` was called with a token that is already cancelled
    #[error("cannot start worker with invalid context")]
    InvalidContext,

    /// `start` was called on a worker whose processing loop is live
    #[error("worker {0} is already running")]
    AlreadyRunning(String),

    /// `start` was called on a worker that has been stopped
    #[error("worker {0} has been stopped and cannot be restarted")]
    AlreadyStopped(String),

    /// A job was submitted before `start`
    #[error("worker {0} has not been started")]
    NotRunning(String),

    /// A second job handler registration on the same worker
    #[error("job handler already registered for worker {0}")]
    HandlerAlreadyRegistered(String),

    /// The pool already holds a worker under this key
    #[error("a worker with key {key} already exists")]
    DuplicateKey {
        key: String,
        /// The incumbent, left untouched
        existing: WorkerHandle,
    },

    /// A pool entry cannot accept the broadcast job type
    #[error("failed to broadcast to worker {id}: it accepts {expected}, not {actual}")]
    BroadcastTypeMismatch {
        id: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// The worker's token has been cancelled
    #[error("worker context cancelled")]
    Cancelled,
}

impl WorkerError {
    /// True for the terminal cancellation error
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WorkerError::Cancelled)
    }
}

/// Result alias for worker and pool operations
pub type Result<T> = std::result::Result<T, WorkerError>;
