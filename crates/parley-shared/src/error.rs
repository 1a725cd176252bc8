use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParleyError {
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid key size: expected {expected} bytes, got {got}")]
    InvalidKeySize { expected: usize, got: usize },

    #[error("Cipher initialization failed: {0}")]
    CipherInit(String),

    #[error("Authentication failed: invalid ciphertext or wrong key")]
    AuthenticationFailed,

    #[error("Ciphertext truncated: need at least {min} bytes, got {got}")]
    Truncated { min: usize, got: usize },

    #[error("Asymmetric operation failed: {0}")]
    Asymmetric(String),

    #[error("Key derivation rounds must be between 1 and {max}")]
    InvalidRounds { max: u32 },
}

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Failed to generate keypair: {0}")]
    GenerationFailed(String),

    #[error("Invalid PEM encoding: {0}")]
    InvalidPem(String),

    #[error("Unknown key block label: {0}")]
    UnknownLabel(String),

    #[error("Private key is encrypted but no password was given")]
    PasswordRequired,

    #[error("Public key does not match private key")]
    Mismatch,

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Key file error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("User name is {0} bytes (max 64)")]
    NameTooLong(usize),

    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("User id does not verify against the peer's public key")]
    InvalidId,

    #[error("Malformed user record: {0}")]
    Malformed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unexpected status byte: {0:#04x}")]
    UnexpectedStatus(u8),

    #[error("Unexpected message tag: {0:#04x}")]
    UnexpectedMessage(u8),

    #[error("Unrecognized message tag: {0:#04x}")]
    UnrecognizedMessage(u8),

    #[error("Truncated frame: need at least {min} bytes, got {got}")]
    Truncated { min: usize, got: usize },

    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Invalid text encoding")]
    InvalidText,
}
