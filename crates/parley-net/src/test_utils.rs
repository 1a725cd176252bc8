//! Loopback helpers for tests in this and downstream crates.

use std::net::{IpAddr, Ipv4Addr};

use parley_shared::test_utils::{test_keys, test_user};
use parley_shared::types::Color;

use crate::config::NetConfig;
use crate::handshake::{connect_peer, HandshakeListener};
use crate::tunnel::Tunnel;

/// Loopback-only config with every port ephemeral.
pub fn loopback_config() -> NetConfig {
    NetConfig {
        handshake_port: 0,
        initiator_listen_port: 0,
        responder_listen_port: 0,
        bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
        ..NetConfig::default()
    }
}

/// Run a full handshake between alice (initiator) and bob (responder) over
/// loopback and return `(alice, bob)`.
pub async fn connected_pair() -> (Tunnel, Tunnel) {
    let (alice, bob) = test_keys();
    let alice_user = test_user("alice", Color::Red, &alice);
    let bob_user = test_user("bob", Color::Blue, &bob);

    let config = loopback_config();
    let listener = HandshakeListener::bind(&config)
        .await
        .expect("bind handshake listener");
    let dial_config = NetConfig {
        handshake_port: listener.local_addr().expect("listener address").port(),
        ..config
    };

    let (initiator, responder) = tokio::join!(
        connect_peer("127.0.0.1", &alice, &alice_user, &dial_config),
        listener.accept_peer(&bob, &bob_user),
    );
    (
        initiator.expect("initiator handshake"),
        responder.expect("responder handshake"),
    )
}
