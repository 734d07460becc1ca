//! Transfer-level errors: the codec's errors, the API collaborator's
//! errors, and the two conditions unique to the transfer engine
//! (checksum mismatch, cancellation).

use crate::api::ApiError;
use crate::codec;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Codec(#[from] codec::Error),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("checksum mismatch: local {local}, remote {remote}")]
    ChecksumMismatch { local: String, remote: String },

    #[error("transfer cancelled")]
    Cancelled,

    /// Aggregates the errors of every range task that failed within one
    /// file transfer.
    #[error("{failed} of {total} range tasks failed")]
    RangeTasksFailed {
        failed: usize,
        total: usize,
        errors: Vec<Error>,
    },
}

/// Returning `None` swallows the error and keeps the worker running;
/// `Some(e)` propagates it as the worker's terminal error (spec §7).
pub trait ErrorHandler: Fn(Error) -> Option<Error> + Send + Sync {}
impl<F: Fn(Error) -> Option<Error> + Send + Sync> ErrorHandler for F {}
