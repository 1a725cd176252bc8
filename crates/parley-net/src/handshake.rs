//! Two-party handshake that turns a TCP connection into a [`Tunnel`].
//!
//! The initiator dials the responder's handshake port. Over that single
//! connection the peers swap public keys, agree on a session key chosen by
//! the initiator, prove that both hold it, exchange user records, and
//! announce the ports of two fresh listeners. Each side then dials the
//! other's listener, giving one TCP stream per direction, and the handshake
//! connection is dropped.
//!
//! Any failure sends a best-effort `[ERROR]` frame and aborts the attempt.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use parley_shared::constants::SYMMETRIC_KEY_SIZE;
use parley_shared::crypto::{self, SymmetricKey};
use parley_shared::error::{CryptoError, ProtocolError, ValidationError};
use parley_shared::keys::{fingerprint, parse_public_key_pem, KeyPair};
use parley_shared::protocol::{MSG_INIT, STATUS_OK};
use parley_shared::types::User;
use rsa::RsaPublicKey;
use subtle::ConstantTimeEq;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::config::NetConfig;
use crate::error::{NetError, Result};
use crate::framing::{read_frame, read_status, send_error, write_frame, write_status};
use crate::tunnel::Tunnel;

/// Dial `host` on the configured handshake port and run the initiator side.
pub async fn connect_peer(
    host: &str,
    keys: &KeyPair,
    user: &User,
    config: &NetConfig,
) -> Result<Tunnel> {
    let timeout = config.handshake_timeout;
    let mut stream = bounded_connect((host, config.handshake_port), timeout).await?;
    let peer_addr = stream.peer_addr()?;
    debug!(peer = %peer_addr, "Connected to handshake port");

    match initiate(&mut stream, peer_addr.ip(), keys, user, config).await {
        Ok(tunnel) => {
            info!(
                peer = %tunnel.peer().name,
                addr = %peer_addr,
                fingerprint = %fingerprint(tunnel.peer_public_key()),
                "Session established"
            );
            Ok(tunnel)
        }
        Err(e) => {
            warn!(peer = %peer_addr, error = %e, "Handshake failed");
            send_error(&mut stream, timeout).await;
            Err(e)
        }
    }
}

async fn initiate(
    stream: &mut TcpStream,
    peer_ip: IpAddr,
    keys: &KeyPair,
    user: &User,
    config: &NetConfig,
) -> Result<Tunnel> {
    let timeout = config.handshake_timeout;

    // 1-2. Swap public keys.
    let mut hello = vec![MSG_INIT];
    hello.extend_from_slice(keys.public_key_pem()?.as_bytes());
    write_frame(stream, &hello, timeout).await?;

    let peer_key = parse_public_key_pem(&read_status(stream, timeout).await?)?;
    debug!(fingerprint = %fingerprint(&peer_key), "Received peer public key");

    // 3. Hand over the session key.
    let session_key = Zeroizing::new(crypto::generate_symmetric_key());
    let wrapped = crypto::rsa_encrypt(&peer_key, session_key.as_slice())?;
    write_frame(stream, &wrapped, timeout).await?;
    read_status(stream, timeout).await?;
    debug!("Session key accepted");

    // 4. The responder proves it unwrapped the key by decrypting a challenge.
    let challenge = crypto::generate_nonce();
    write_frame(
        stream,
        &crypto::encrypt(session_key.as_slice(), &challenge)?,
        timeout,
    )
    .await?;
    let answer = read_status(stream, timeout).await?;
    let answer = crypto::rsa_decrypt(keys.private_key(), &answer)
        .map_err(|_| NetError::SessionVerificationFailed)?;
    if !bool::from(answer.as_slice().ct_eq(&challenge)) {
        return Err(NetError::SessionVerificationFailed);
    }
    debug!("Session verified");

    // 5-6. Exchange user records, ours first.
    send_user(stream, &session_key, user, timeout).await?;
    let peer = receive_user(stream, &session_key, &peer_key, timeout).await?;
    debug!(peer = %peer.name, "Peer user validated");

    // 7. Final ack, announcing where we accept the responder's dial.
    let listener = TcpListener::bind((config.bind_addr, config.initiator_listen_port)).await?;
    let port = listener.local_addr()?.port();
    write_status(stream, STATUS_OK, &port.to_le_bytes(), timeout).await?;
    debug!(port, "Incoming listener ready");

    // 8. Wait for the responder's listener, then cross-connect.
    let responder_port = read_port(&read_status(stream, timeout).await?)?;
    let (incoming, outgoing) = tokio::try_join!(
        accept_from(&listener, peer_ip, timeout),
        bounded_connect((peer_ip, responder_port), timeout),
    )?;
    debug!(port = responder_port, "Directional streams connected");

    Ok(Tunnel::new(
        session_key,
        keys,
        peer_key,
        (peer, user.clone()),
        incoming,
        outgoing,
        config.io_timeout,
    ))
}

/// The responder's handshake port.
pub struct HandshakeListener {
    listener: TcpListener,
    config: NetConfig,
}

impl HandshakeListener {
    pub async fn bind(config: &NetConfig) -> Result<Self> {
        let listener = TcpListener::bind((config.bind_addr, config.handshake_port)).await?;
        info!(addr = %listener.local_addr()?, "Waiting for peer");
        Ok(Self {
            listener,
            config: config.clone(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept one handshake connection and run the responder side.
    pub async fn accept_peer(&self, keys: &KeyPair, user: &User) -> Result<Tunnel> {
        let (mut stream, peer_addr) = self.listener.accept().await?;
        debug!(peer = %peer_addr, "Accepted handshake connection");

        match respond(&mut stream, peer_addr.ip(), keys, user, &self.config).await {
            Ok(tunnel) => {
                info!(
                    peer = %tunnel.peer().name,
                    addr = %peer_addr,
                    fingerprint = %fingerprint(tunnel.peer_public_key()),
                    "Session established"
                );
                Ok(tunnel)
            }
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "Handshake failed");
                send_error(&mut stream, self.config.handshake_timeout).await;
                Err(e)
            }
        }
    }
}

/// Bind the handshake port and wait for a single peer.
pub async fn await_peer(keys: &KeyPair, user: &User, config: &NetConfig) -> Result<Tunnel> {
    HandshakeListener::bind(config)
        .await?
        .accept_peer(keys, user)
        .await
}

async fn respond(
    stream: &mut TcpStream,
    peer_ip: IpAddr,
    keys: &KeyPair,
    user: &User,
    config: &NetConfig,
) -> Result<Tunnel> {
    let timeout = config.handshake_timeout;

    // 1-2. Swap public keys.
    let hello = read_frame(stream, timeout).await?;
    let (&tag, pem) = hello
        .split_first()
        .ok_or(ProtocolError::Truncated { min: 1, got: 0 })?;
    if tag != MSG_INIT {
        return Err(ProtocolError::UnexpectedMessage(tag).into());
    }
    let peer_key = parse_public_key_pem(pem)?;
    debug!(fingerprint = %fingerprint(&peer_key), "Received peer public key");
    write_status(stream, STATUS_OK, keys.public_key_pem()?.as_bytes(), timeout).await?;

    // 3. Unwrap the session key.
    let wrapped = read_frame(stream, timeout).await?;
    let unwrapped = Zeroizing::new(crypto::rsa_decrypt(keys.private_key(), &wrapped)?);
    let session_key: Zeroizing<SymmetricKey> = Zeroizing::new(
        unwrapped
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidKeySize {
                expected: SYMMETRIC_KEY_SIZE,
                got: unwrapped.len(),
            })?,
    );
    write_status(stream, STATUS_OK, &[], timeout).await?;
    debug!("Session key accepted");

    // 4. Answer the challenge for the initiator's eyes only.
    let challenge = read_frame(stream, timeout).await?;
    let challenge = crypto::decrypt(session_key.as_slice(), &challenge)?;
    let answer = crypto::rsa_encrypt(&peer_key, &challenge)?;
    write_status(stream, STATUS_OK, &answer, timeout).await?;

    // 5-6. Exchange user records, theirs first.
    let peer = receive_user(stream, &session_key, &peer_key, timeout).await?;
    debug!(peer = %peer.name, "Peer user validated");
    send_user(stream, &session_key, user, timeout).await?;

    // 7. Final ack carries the initiator's listener port.
    let initiator_port = read_port(&read_status(stream, timeout).await?)?;

    // 8. Announce our own listener, then cross-connect.
    let listener = TcpListener::bind((config.bind_addr, config.responder_listen_port)).await?;
    let port = listener.local_addr()?.port();
    write_status(stream, STATUS_OK, &port.to_le_bytes(), timeout).await?;
    debug!(port, "Incoming listener ready");

    let (outgoing, incoming) = tokio::try_join!(
        bounded_connect((peer_ip, initiator_port), timeout),
        accept_from(&listener, peer_ip, timeout),
    )?;
    debug!(port = initiator_port, "Directional streams connected");

    Ok(Tunnel::new(
        session_key,
        keys,
        peer_key,
        (peer, user.clone()),
        incoming,
        outgoing,
        config.io_timeout,
    ))
}

async fn send_user(
    stream: &mut TcpStream,
    session_key: &SymmetricKey,
    user: &User,
    timeout: Option<Duration>,
) -> Result<()> {
    let record = crypto::encrypt(session_key, &user.to_bytes()?)?;
    write_status(stream, STATUS_OK, &record, timeout).await
}

async fn receive_user(
    stream: &mut TcpStream,
    session_key: &SymmetricKey,
    peer_key: &RsaPublicKey,
    timeout: Option<Duration>,
) -> Result<User> {
    let record = read_status(stream, timeout).await?;
    let record = crypto::decrypt(session_key, &record)
        .map_err(|e| ValidationError::Malformed(e.to_string()))?;
    let peer = User::from_bytes(&record)?;
    peer.validate(peer_key)?;
    Ok(peer)
}

fn read_port(body: &[u8]) -> Result<u16> {
    let bytes: [u8; 2] = body
        .get(..2)
        .and_then(|b| b.try_into().ok())
        .ok_or(ProtocolError::Truncated {
            min: 2,
            got: body.len(),
        })?;
    Ok(u16::from_le_bytes(bytes))
}

async fn bounded_connect(
    addr: impl tokio::net::ToSocketAddrs,
    timeout: Option<Duration>,
) -> Result<TcpStream> {
    let connect = TcpStream::connect(addr);
    let stream = match timeout {
        Some(limit) => tokio::time::timeout(limit, connect)
            .await
            .map_err(|_| NetError::Timeout(limit))??,
        None => connect.await?,
    };
    Ok(stream)
}

/// Accept the peer's dial. Only the host we are handshaking with may connect.
async fn accept_from(
    listener: &TcpListener,
    peer_ip: IpAddr,
    timeout: Option<Duration>,
) -> Result<TcpStream> {
    let accept = listener.accept();
    let (stream, addr) = match timeout {
        Some(limit) => tokio::time::timeout(limit, accept)
            .await
            .map_err(|_| NetError::Timeout(limit))??,
        None => accept.await?,
    };
    if addr.ip() != peer_ip {
        return Err(NetError::UnexpectedPeer(addr));
    }
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use parley_shared::protocol::{MSG_TEXT, STATUS_ERROR};
    use parley_shared::test_utils::{mallory_key, test_keys, test_user};
    use parley_shared::types::Color;

    use super::*;
    use crate::test_utils::loopback_config;

    async fn listen() -> (HandshakeListener, NetConfig) {
        let config = loopback_config();
        let listener = HandshakeListener::bind(&config).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let dial_config = NetConfig {
            handshake_port: port,
            ..config
        };
        (listener, dial_config)
    }

    #[tokio::test]
    async fn test_handshake_establishes_tunnel() {
        let (alice, bob) = test_keys();
        let alice_user = test_user("alice", Color::Red, &alice);
        let bob_user = test_user("bob", Color::Blue, &bob);
        let (listener, config) = listen().await;

        let (initiator, responder) = tokio::join!(
            connect_peer("127.0.0.1", &alice, &alice_user, &config),
            listener.accept_peer(&bob, &bob_user),
        );
        let (initiator, responder) = (initiator.unwrap(), responder.unwrap());

        assert_eq!(initiator.peer(), &bob_user);
        assert_eq!(initiator.user(), &alice_user);
        assert_eq!(responder.peer(), &alice_user);
        assert_eq!(initiator.peer_public_key(), bob.public_key());
        assert_eq!(responder.peer_public_key(), alice.public_key());

        let (sent, received) =
            tokio::join!(initiator.send_message(b"\x02hey"), responder.await_message());
        sent.unwrap();
        assert_eq!(received.unwrap(), b"\x02hey");
    }

    #[tokio::test]
    async fn test_forged_identity_rejected_by_responder() {
        let (alice, bob) = test_keys();
        // Alice presents an id signed by a key she does not use.
        let impostor = test_user("alice", Color::Red, &mallory_key());
        let bob_user = test_user("bob", Color::Blue, &bob);
        let (listener, config) = listen().await;

        let (initiator, responder) = tokio::join!(
            connect_peer("127.0.0.1", &alice, &impostor, &config),
            listener.accept_peer(&bob, &bob_user),
        );
        assert!(matches!(
            responder,
            Err(NetError::PeerValidationFailed(ValidationError::InvalidId))
        ));
        assert!(matches!(
            initiator,
            Err(NetError::Protocol(ProtocolError::UnexpectedStatus(STATUS_ERROR)))
        ));
    }

    #[tokio::test]
    async fn test_long_name_rejected_by_initiator() {
        let (alice, bob) = test_keys();
        let alice_user = test_user("alice", Color::Red, &alice);
        let mut bob_user = test_user("bob", Color::Blue, &bob);
        bob_user.name = "b".repeat(65);
        let (listener, config) = listen().await;

        let (initiator, responder) = tokio::join!(
            connect_peer("127.0.0.1", &alice, &alice_user, &config),
            listener.accept_peer(&bob, &bob_user),
        );
        assert!(matches!(
            initiator,
            Err(NetError::PeerValidationFailed(ValidationError::NameTooLong(65)))
        ));
        assert!(responder.is_err());
    }

    #[tokio::test]
    async fn test_responder_requires_init_first() {
        let (_, bob) = test_keys();
        let bob_user = test_user("bob", Color::Blue, &bob);
        let (listener, config) = listen().await;

        let client = async {
            let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, config.handshake_port))
                .await
                .unwrap();
            write_frame(&mut stream, &[MSG_TEXT, b'h', b'i'], None)
                .await
                .unwrap();
            read_frame(&mut stream, None).await.unwrap()
        };
        let (reply, responder) = tokio::join!(client, listener.accept_peer(&bob, &bob_user));

        assert_eq!(reply, vec![STATUS_ERROR]);
        assert!(matches!(
            responder,
            Err(NetError::Protocol(ProtocolError::UnexpectedMessage(MSG_TEXT)))
        ));
    }

    #[tokio::test]
    async fn test_wrong_challenge_answer_fails_verification() {
        let (alice, bob) = test_keys();
        let alice_user = test_user("alice", Color::Red, &alice);
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let config = NetConfig {
            handshake_port: listener.local_addr().unwrap().port(),
            ..loopback_config()
        };

        // A responder that accepts the key but cannot decrypt the challenge.
        let fake_responder = async {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_frame(&mut stream, None).await.unwrap();
            let pem = bob.public_key_pem().unwrap();
            write_status(&mut stream, STATUS_OK, pem.as_bytes(), None)
                .await
                .unwrap();
            read_frame(&mut stream, None).await.unwrap();
            write_status(&mut stream, STATUS_OK, &[], None).await.unwrap();
            read_frame(&mut stream, None).await.unwrap();
            let guess = crypto::rsa_encrypt(alice.public_key(), &[0u8; 16]).unwrap();
            write_status(&mut stream, STATUS_OK, &guess, None)
                .await
                .unwrap();
            read_frame(&mut stream, None).await.unwrap()
        };

        let (initiator, last_frame) = tokio::join!(
            connect_peer("127.0.0.1", &alice, &alice_user, &config),
            fake_responder,
        );
        assert!(matches!(initiator, Err(NetError::SessionVerificationFailed)));
        assert_eq!(last_frame, vec![STATUS_ERROR]);
    }

    #[tokio::test]
    async fn test_handshake_times_out_on_silent_peer() {
        let (alice, _) = test_keys();
        let alice_user = test_user("alice", Color::Red, &alice);
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let config = NetConfig {
            handshake_port: listener.local_addr().unwrap().port(),
            handshake_timeout: Some(Duration::from_millis(200)),
            ..loopback_config()
        };

        let silent = async {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
            drop(stream);
        };
        let (initiator, ()) = tokio::join!(
            connect_peer("127.0.0.1", &alice, &alice_user, &config),
            silent,
        );
        assert!(matches!(initiator, Err(NetError::Timeout(_))));
    }

    #[test]
    fn test_read_port() {
        assert_eq!(read_port(&[0x50, 0x14]).unwrap(), 5200);
        assert!(read_port(&[0x50]).is_err());
    }
}
