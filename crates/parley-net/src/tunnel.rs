//! The encrypted, mutually authenticated channel produced by a handshake.
//!
//! Each message travels as one frame `signature ‖ nonce ‖ ciphertext ‖ tag`
//! on the sender's outgoing stream and is acknowledged with a one-byte status
//! frame on the same stream. The two directions use separate TCP connections
//! and separate locks, so sending never waits on a pending receive.

use std::time::Duration;

use parley_shared::constants::MIN_CIPHERTEXT_SIZE;
use parley_shared::crypto::{self, SymmetricKey};
use parley_shared::error::ProtocolError;
use parley_shared::keys::{fingerprint, KeyPair};
use parley_shared::protocol::{Payload, STATUS_ERROR, STATUS_OK};
use parley_shared::types::User;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::error::{NetError, Result};
use crate::framing::{read_frame, read_status, write_frame, write_status};

/// Upper bound on the farewell `DISCONNECT` exchange during shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct Tunnel {
    session_key: Zeroizing<SymmetricKey>,
    private_key: RsaPrivateKey,
    peer_public_key: RsaPublicKey,
    incoming: Mutex<TcpStream>,
    outgoing: Mutex<TcpStream>,
    peer: User,
    user: User,
    io_timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl Tunnel {
    pub(crate) fn new(
        session_key: Zeroizing<SymmetricKey>,
        keys: &KeyPair,
        peer_public_key: RsaPublicKey,
        (peer, user): (User, User),
        incoming: TcpStream,
        outgoing: TcpStream,
        io_timeout: Option<Duration>,
    ) -> Self {
        Self {
            session_key,
            private_key: keys.private_key().clone(),
            peer_public_key,
            incoming: Mutex::new(incoming),
            outgoing: Mutex::new(outgoing),
            peer,
            user,
            io_timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// The authenticated remote user.
    pub fn peer(&self) -> &User {
        &self.peer
    }

    /// The local user as presented to the peer.
    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn peer_public_key(&self) -> &RsaPublicKey {
        &self.peer_public_key
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Sign, encrypt and send one payload, then wait for the peer's verdict.
    pub async fn send_message(&self, payload: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(NetError::Closed);
        }

        let signature = crypto::sign(&self.private_key, payload)?;
        let ciphertext = crypto::encrypt(self.session_key.as_slice(), payload)?;
        let mut frame = signature;
        frame.extend_from_slice(&ciphertext);

        let mut outgoing = self.outgoing.lock().await;
        tokio::select! {
            _ = self.cancel.cancelled() => Err(NetError::Cancelled),
            result = async {
                write_frame(&mut *outgoing, &frame, self.io_timeout).await?;
                match read_status(&mut *outgoing, self.io_timeout).await {
                    Ok(_) => Ok(()),
                    Err(NetError::Protocol(ProtocolError::UnexpectedStatus(_))) => {
                        Err(NetError::MessageRejected)
                    }
                    Err(e) => Err(e),
                }
            } => {
                if result.is_ok() {
                    debug!(peer = %self.peer.name, len = frame.len(), "Message delivered");
                }
                result
            }
        }
    }

    /// Wait for the next authenticated payload from the peer.
    ///
    /// A message that fails authentication is answered with `[ERROR]` and
    /// surfaced as an error; the tunnel stays usable.
    pub async fn await_message(&self) -> Result<Vec<u8>> {
        if self.is_closed() {
            return Err(NetError::Closed);
        }

        let mut incoming = self.incoming.lock().await;
        tokio::select! {
            _ = self.cancel.cancelled() => Err(NetError::Cancelled),
            result = self.receive(&mut incoming) => result,
        }
    }

    async fn receive(&self, stream: &mut TcpStream) -> Result<Vec<u8>> {
        let frame = read_frame(stream, None).await?;

        match self.open(&frame) {
            Ok(payload) => {
                write_status(stream, STATUS_OK, &[], self.io_timeout).await?;
                debug!(peer = %self.peer.name, len = frame.len(), "Message received");
                Ok(payload)
            }
            Err(e) => {
                warn!(peer = %self.peer.name, len = frame.len(), error = %e, "Rejected message");
                write_status(stream, STATUS_ERROR, &[], self.io_timeout).await?;
                Err(e)
            }
        }
    }

    fn open(&self, frame: &[u8]) -> Result<Vec<u8>> {
        let sig_size = self.peer_public_key.size();
        let min = sig_size + MIN_CIPHERTEXT_SIZE;
        if frame.len() < min {
            return Err(ProtocolError::Truncated {
                min,
                got: frame.len(),
            }
            .into());
        }

        let (signature, ciphertext) = frame.split_at(sig_size);
        let payload = crypto::decrypt(self.session_key.as_slice(), ciphertext)
            .map_err(|_| NetError::AuthenticationFailed)?;
        if !crypto::verify(&self.peer_public_key, &payload, signature) {
            return Err(NetError::AuthenticationFailed);
        }
        Ok(payload)
    }

    /// Say goodbye to the peer, then close both streams.
    ///
    /// The farewell is best effort: its outcome is logged and the tunnel is
    /// closed regardless. Any `await_message` blocked on this tunnel returns
    /// [`NetError::Cancelled`].
    pub async fn shutdown(&self) -> Result<()> {
        if self.is_closed() {
            return Err(NetError::Closed);
        }

        let farewell = Payload::Disconnect.encode();
        match tokio::time::timeout(SHUTDOWN_GRACE, self.send_message(&farewell)).await {
            Ok(Ok(())) => debug!(peer = %self.peer.name, "Peer acknowledged disconnect"),
            Ok(Err(e)) => warn!(peer = %self.peer.name, error = %e, "Disconnect not acknowledged"),
            Err(_) => warn!(peer = %self.peer.name, "Disconnect timed out"),
        }

        self.close().await;
        Ok(())
    }

    /// Close both streams without notifying the peer, e.g. after the peer
    /// already disconnected.
    pub async fn close(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();

        if let Err(e) = self.outgoing.lock().await.shutdown().await {
            debug!(error = %e, "Outgoing stream already closed");
        }
        if let Err(e) = self.incoming.lock().await.shutdown().await {
            debug!(error = %e, "Incoming stream already closed");
        }
        info!(
            peer = %self.peer.name,
            fingerprint = %fingerprint(&self.peer_public_key),
            "Tunnel closed"
        );
    }
}

impl std::fmt::Debug for Tunnel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tunnel")
            .field("peer", &self.peer.name)
            .field("user", &self.user.name)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
