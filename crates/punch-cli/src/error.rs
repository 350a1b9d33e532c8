use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] punch_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No client given and no default_client configured; pass --client")]
    NoClient,
    #[error("Unknown client '{0}'; register it with `punch client add {0}`")]
    UnknownClient(String),
    #[error("No sessions found")]
    NoSessions,
    #[error("Invalid date '{0}'")]
    InvalidDate(String),
}
