use std::net::SocketAddr;
use std::time::Duration;

use parley_shared::error::{CryptoError, KeyError, ProtocolError, ValidationError};
use thiserror::Error;

/// Errors produced by the handshake and the tunnel.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Network error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// A blocked operation was interrupted by a tunnel shutdown.
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Connection closed")]
    Closed,

    #[error("Peer failed to prove possession of the session key")]
    SessionVerificationFailed,

    #[error("Peer validation failed: {0}")]
    PeerValidationFailed(#[from] ValidationError),

    #[error("Peer rejected the message")]
    MessageRejected,

    /// An inbound message failed decryption or signature verification.
    #[error("Message failed authentication")]
    AuthenticationFailed,

    #[error("Unexpected connection from {0}")]
    UnexpectedPeer(SocketAddr),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NetError>;
