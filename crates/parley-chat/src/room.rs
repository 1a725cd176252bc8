//! A chat session on top of an established [`Tunnel`].
//!
//! The room is shared as `Arc<Chatroom>` between a foreground task that sends
//! and runs commands and a background task looping on
//! [`Chatroom::await_message`]. The log lock is never held across network
//! I/O.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parley_net::{NetError, Tunnel};
use parley_shared::protocol::Payload;
use parley_shared::types::{Color, User};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::archive::archive_chat;
use crate::error::{ArchiveError, ChatError, Result};
use crate::log::{Message, MessageLog};
use crate::render::{PlainRenderer, Renderer};

/// What [`Chatroom::await_message`] did with an inbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A message from the peer was added under this id.
    Received(u32),
    /// The peer deleted one of its own messages.
    Deleted(u32),
    /// The peer asked to delete a message that is absent or not theirs.
    DeleteIgnored(u32),
    /// The peer archived the conversation; a notice was added under this id.
    PeerArchived(u32),
    /// The peer left. The room is now inactive.
    Disconnected,
}

pub struct Chatroom {
    tunnel: Tunnel,
    log: Mutex<MessageLog>,
    active: AtomicBool,
    renderer: Box<dyn Renderer>,
}

impl Chatroom {
    pub fn new(tunnel: Tunnel, renderer: impl Renderer + 'static) -> Self {
        Self {
            tunnel,
            log: Mutex::new(MessageLog::default()),
            active: AtomicBool::new(true),
            renderer: Box::new(renderer),
        }
    }

    pub fn peer(&self) -> &User {
        self.tunnel.peer()
    }

    pub fn user(&self) -> &User {
        self.tunnel.user()
    }

    pub fn tunnel(&self) -> &Tunnel {
        &self.tunnel
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub async fn push_message(
        &self,
        content: impl Into<String>,
        sender: User,
        color: Option<Color>,
    ) -> u32 {
        self.log.lock().await.push(content, sender, color)
    }

    /// Wait for one payload from the peer and apply it to the log.
    ///
    /// Rejected or unrecognized payloads are returned as errors and leave
    /// the room active.
    pub async fn await_message(&self) -> Result<ChatEvent> {
        if !self.is_active() {
            return Err(ChatError::Inactive);
        }

        let bytes = match self.tunnel.await_message().await {
            Ok(bytes) => bytes,
            Err(NetError::Closed | NetError::Cancelled) => {
                self.deactivate();
                return Err(ChatError::Inactive);
            }
            Err(e) => return Err(e.into()),
        };

        let peer = self.peer().clone();
        match Payload::decode(&bytes)? {
            Payload::Text(text) => {
                let id = self.push_message(text, peer, None).await;
                Ok(ChatEvent::Received(id))
            }
            Payload::ColoredText { color, text } => {
                let id = self.push_message(text, peer, Some(color)).await;
                Ok(ChatEvent::Received(id))
            }
            Payload::Delete(id) => {
                let mut log = self.log.lock().await;
                if log.get(id).is_some_and(|m| m.sender == peer) {
                    log.remove(id);
                    debug!(id, "Peer deleted message");
                    Ok(ChatEvent::Deleted(id))
                } else {
                    warn!(id, peer = %peer.name, "Ignored delete for message not sent by peer");
                    Ok(ChatEvent::DeleteIgnored(id))
                }
            }
            Payload::ArchiveNotice => {
                let notice = format!("{} saved this conversation to an archive", peer.name);
                let id = self.push_message(notice, User::system(), None).await;
                Ok(ChatEvent::PeerArchived(id))
            }
            Payload::Disconnect => {
                info!(peer = %peer.name, "Peer disconnected");
                self.deactivate();
                self.tunnel.close().await;
                Ok(ChatEvent::Disconnected)
            }
        }
    }

    async fn send(&self, payload: &Payload) -> Result<()> {
        if !self.is_active() {
            return Err(ChatError::Inactive);
        }
        match self.tunnel.send_message(&payload.encode()).await {
            Ok(()) => Ok(()),
            Err(e @ (NetError::Closed | NetError::Cancelled)) => {
                self.deactivate();
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Send a text message and log it as our own.
    pub async fn send_message(&self, text: &str) -> Result<u32> {
        self.send(&Payload::Text(text.to_string())).await?;
        Ok(self.push_message(text, self.user().clone(), None).await)
    }

    /// Send a text message shown in `color` instead of our usual color.
    pub async fn send_colored(&self, text: &str, color: Color) -> Result<u32> {
        self.send(&Payload::ColoredText {
            color,
            text: text.to_string(),
        })
        .await?;
        Ok(self
            .push_message(text, self.user().clone(), Some(color))
            .await)
    }

    /// Remove a message locally and ask the peer to do the same.
    ///
    /// Returns `Ok(false)` without contacting the peer when the room is
    /// inactive or the message is already gone. A failed send marks the
    /// room inactive.
    pub async fn delete_message(&self, id: u32) -> Result<bool> {
        if !self.is_active() {
            return Ok(false);
        }
        if self.log.lock().await.remove(id).is_none() {
            return Ok(false);
        }

        if let Err(e) = self.tunnel.send_message(&Payload::Delete(id).encode()).await {
            warn!(id, error = %e, "Delete not delivered, closing room");
            self.deactivate();
            return Err(e.into());
        }
        debug!(id, "Deleted message");
        Ok(true)
    }

    /// Send a message now and delete it on both sides after `delay`.
    ///
    /// The deletion runs detached and cannot be cancelled. If the session
    /// has ended by then it does nothing.
    pub async fn timed_message(self: &Arc<Self>, text: &str, delay: Duration) -> Result<u32> {
        let id = self.send_message(text).await?;
        let room = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match room.delete_message(id).await {
                Ok(true) => debug!(id, "Timed message expired"),
                Ok(false) => debug!(id, "Timed message already gone"),
                Err(e) => warn!(id, error = %e, "Failed to expire timed message"),
            }
        });
        Ok(id)
    }

    /// Encrypt the current log into `dir` and tell the peer about it.
    ///
    /// The archive is always plain text. The peer is only notified while
    /// the room is active; a failed notification does not undo the archive.
    pub async fn archive(&self, dir: &Path, password: &[u8], rounds: u32) -> Result<PathBuf> {
        let text = {
            let log = self.log.lock().await;
            PlainRenderer.render_all(log.iter())
        };
        let password = Zeroizing::new(password.to_vec());
        let dir = dir.to_path_buf();
        // Key derivation and file writes stay off the runtime workers.
        let path = tokio::task::spawn_blocking(move || {
            archive_chat(&text, &password, &dir, rounds)
        })
        .await
        .unwrap_or_else(|e| Err(ArchiveError::Io(std::io::Error::other(e.to_string()))))?;

        if self.is_active() {
            match self.send(&Payload::ArchiveNotice).await {
                Ok(()) => {
                    // Mirrors the notice the peer adds, keeping ids aligned.
                    let notice = format!("Conversation archived to {}", path.display());
                    self.push_message(notice, User::system(), None).await;
                }
                Err(e) => warn!(error = %e, "Failed to notify peer of archive"),
            }
        }
        Ok(path)
    }

    /// Clear the local log. The peer's log is untouched.
    pub async fn clear(&self) {
        self.log.lock().await.clear();
    }

    /// Id of our newest message still in the log.
    pub async fn last_own_message(&self) -> Option<u32> {
        self.log.lock().await.last_from(self.user())
    }

    /// Snapshot of the log in id order.
    pub async fn messages(&self) -> Vec<Message> {
        self.log.lock().await.iter().cloned().collect()
    }

    pub async fn render_log(&self) -> String {
        let log = self.log.lock().await;
        log.iter()
            .map(|m| self.renderer.render(m))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Leave the session: notify the peer and close the tunnel.
    pub async fn disconnect(&self) -> Result<()> {
        if !self.active.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        match self.tunnel.shutdown().await {
            Ok(()) | Err(NetError::Closed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for Chatroom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chatroom")
            .field("tunnel", &self.tunnel)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
