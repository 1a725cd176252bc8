/// AES-256-GCM key size in bytes
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// AES-GCM nonce size in bytes
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size in bytes
pub const TAG_SIZE: usize = 16;

/// Smallest possible output of `crypto::encrypt` (empty plaintext)
pub const MIN_CIPHERTEXT_SIZE: usize = NONCE_SIZE + TAG_SIZE;

/// Size of handshake challenges and password salts
pub const CHALLENGE_SIZE: usize = 16;
pub const SALT_SIZE: usize = 16;

/// Default RSA modulus size for freshly generated keypairs
pub const RSA_KEY_BITS: usize = 4096;

/// Key derivation rounds used for archives and encrypted private keys
pub const ARCHIVE_KDF_ROUNDS: u32 = 256;

/// Upper bound on key derivation rounds, including counts read from files
pub const MAX_KDF_ROUNDS: u32 = 1 << 20;

/// Maximum user name length in bytes
pub const MAX_NAME_LEN: usize = 64;

/// Arbitrary constant whose signature forms a user's id
pub const ID_SIGNATURE_CONSTANT: [u8; 16] = [
    108, 14, 41, 125, 134, 205, 20, 243, 160, 29, 4, 162, 61, 70, 126, 246,
];

/// PEM labels for key files
pub const PEM_PUBLIC_LABEL: &str = "RSA PUBLIC KEY";
pub const PEM_PRIVATE_LABEL: &str = "RSA PRIVATE KEY";
pub const PEM_ENCRYPTED_PRIVATE_LABEL: &str = "ENCRYPTED RSA PRIVATE KEY";

/// Key file names inside a key directory
pub const PRIVATE_KEY_FILE: &str = "prv.pem";
pub const PUBLIC_KEY_FILE: &str = "pub.pem";

/// Maximum number of messages kept in a chat log
pub const MAX_MSG_COUNT: usize = 50;

/// Maximum size of a single framed message (1 MiB)
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Default TCP ports
pub const DEFAULT_HANDSHAKE_PORT: u16 = 5200;
pub const DEFAULT_INITIATOR_PORT: u16 = 5201;
pub const DEFAULT_RESPONDER_PORT: u16 = 5202;
