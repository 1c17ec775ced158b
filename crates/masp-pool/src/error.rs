//! error types for the note model

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NoteError {
    /// nullifier requested on a note whose key lacks spending authority
    #[error("missing spending authority")]
    MissingAuthority,

    /// a note's tree index is assigned exactly once, at insertion
    #[error("index already set to {0}")]
    IndexAlreadySet(u64),
}

pub type Result<T> = std::result::Result<T, NoteError>;
