use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by forest construction, training and persistence.
///
/// Empty forests and log-space underflow are not errors: they surface as
/// `f64::NEG_INFINITY` and are handled by the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// A forest is cyclic or otherwise malformed.
    #[error("malformed forest `{forest}`: {reason}")]
    Grammar { forest: String, reason: String },

    /// A checkpoint file could not be read.
    #[error("corrupt checkpoint {}: {reason} at byte offset {offset}", .path.display())]
    Checkpoint {
        path: PathBuf,
        offset: u64,
        reason: String,
    },

    /// Invalid argument or parameter value.
    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn grammar<F: Into<String>, R: Into<String>>(forest: F, reason: R) -> Self {
        Error::Grammar {
            forest: forest.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid<S: Into<String>>(msg: S) -> Self {
        Error::InvalidInput(msg.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
