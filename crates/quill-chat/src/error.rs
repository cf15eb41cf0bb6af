//! Error types for quill-chat

use thiserror::Error;

/// Result type alias using quill-chat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving the pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the wire layer
    #[error(transparent)]
    Wire(#[from] quill_wire::Error),

    /// A retry or edit named a turn that does not exist
    #[error("Turn index {index} out of range (conversation has {len} turns)")]
    InvalidTurnIndex { index: usize, len: usize },

    /// A generic pipeline error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Check if this error only reports a cancelled request
    pub fn is_aborted(&self) -> bool {
        match self {
            Error::Wire(e) => e.is_aborted(),
            _ => false,
        }
    }
}
