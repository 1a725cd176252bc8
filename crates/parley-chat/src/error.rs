use parley_net::NetError;
use parley_shared::error::{CryptoError, ProtocolError};
use thiserror::Error;

/// Errors produced by the chat session.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Network error: {0}")]
    Net(#[from] NetError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// The peer disconnected or the session was closed locally.
    #[error("This chatroom is no longer active")]
    Inactive,

    #[error("Unrecognized command: >{0}")]
    UnrecognizedCommand(String),

    /// Bad arguments; the message is shown to the user as-is.
    #[error("{0}")]
    InvalidArguments(String),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Could not read password: {0}")]
    Prompt(std::io::Error),
}

/// Errors produced while writing or reading an archive file.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Archive file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not an archive: {size} bytes (need at least {min})")]
    InvalidArchive { size: usize, min: usize },

    #[error("Wrong password or corrupted archive")]
    AuthenticationFailed,

    #[error("Archive encryption failed: {0}")]
    Crypto(CryptoError),

    #[error("Archive does not contain valid text")]
    InvalidText,
}

impl From<CryptoError> for ArchiveError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::AuthenticationFailed => ArchiveError::AuthenticationFailed,
            other => ArchiveError::Crypto(other),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ChatError>;
