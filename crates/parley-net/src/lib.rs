// Direct TCP transport: framing, the RSA handshake, and the encrypted tunnel.

pub mod config;
pub mod error;
pub mod framing;
pub mod handshake;
pub mod tunnel;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use config::NetConfig;
pub use error::NetError;
pub use handshake::{await_peer, connect_peer, HandshakeListener};
pub use tunnel::Tunnel;
