//! Error types for punch-core

use thiserror::Error;

use crate::models::SessionId;
use crate::sync::PushConflict;

/// Result type alias using punch-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in punch-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A session for this client is already open
    #[error("Session already started for client '{0}'")]
    AlreadyStarted(String),

    /// The session already has an end time
    #[error("Session already ended")]
    AlreadyEnded,

    /// The session would violate its own invariants (e.g. end before start)
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    /// A similar session (same client and start) already exists
    #[error("Conflicting session: {0}")]
    Conflict(String),

    /// A session with this id already exists
    #[error("Session id {0} already exists")]
    DuplicateId(SessionId),

    /// The interactive editor returned the document untouched
    #[error("No changes made")]
    NoChangesMade,

    /// Conflict resolution was abandoned; nothing was written
    #[error("Merge aborted: no changes were made to the conflict document")]
    MergeAborted,

    /// The edited merge document could not be parsed
    #[error("Invalid merge document at line {line}: {message}")]
    MergeParse { line: usize, message: String },

    /// Push found remote rows that disagree with local sessions
    #[error("{} session(s) conflict with the remote; nothing was pushed", .0.len())]
    PushConflicts(Vec<PushConflict>),

    /// Remote mirror error
    #[error("Remote error: {0}")]
    Remote(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Editor invocation error
    #[error("Editor error: {0}")]
    Editor(String),
}
