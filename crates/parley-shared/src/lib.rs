// Primitives shared by every Parley crate: crypto, keys, identity, wire tags.

pub mod constants;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod keys;
pub mod protocol;
pub mod types;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use error::{CryptoError, KeyError, ParleyError, ProtocolError, ValidationError};
pub use keys::KeyPair;
pub use protocol::Payload;
pub use types::{Color, User, UserId};
