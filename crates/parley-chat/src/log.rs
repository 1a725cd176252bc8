//! Bounded, id-indexed chat history.
//!
//! Ids come from a per-room counter and are never shared with the peer. Both
//! sides still agree on them because each appends messages in the same order
//! they are sent and received, which is what makes deletion by id work.
//!
//! That order only holds while sends do not cross. If both peers send at the
//! same moment each side may log the other's message first, and from then on
//! the ids differ. The peer then answers deletes of our misnumbered messages
//! with `DeleteIgnored` and keeps its copy.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parley_shared::constants::MAX_MSG_COUNT;
use parley_shared::types::{Color, User};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: u32,
    pub content: String,
    pub sender: User,
    /// Overrides the sender's color, set by `>color`.
    pub color: Option<Color>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn display_color(&self) -> Color {
        self.color.unwrap_or(self.sender.color)
    }
}

#[derive(Debug)]
pub struct MessageLog {
    messages: BTreeMap<u32, Message>,
    next_id: u32,
    capacity: usize,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::with_capacity(MAX_MSG_COUNT)
    }
}

impl MessageLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: BTreeMap::new(),
            next_id: 0,
            capacity,
        }
    }

    /// Append a message and return its id. Evicts the oldest message once
    /// the log is over capacity.
    ///
    /// Ids never wrap: when the counter is exhausted the whole log is
    /// cleared, the counter restarts, and a system notice records the reset.
    pub fn push(&mut self, content: impl Into<String>, sender: User, color: Option<Color>) -> u32 {
        if self.next_id == u32::MAX {
            tracing::info!("Message ids exhausted, clearing log");
            self.messages.clear();
            self.next_id = 0;
            self.insert(
                "Message history was reset".to_string(),
                User::system(),
                None,
            );
        }
        self.insert(content.into(), sender, color)
    }

    fn insert(&mut self, content: String, sender: User, color: Option<Color>) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.insert(
            id,
            Message {
                id,
                content,
                sender,
                color,
                timestamp: Utc::now(),
            },
        );
        while self.messages.len() > self.capacity {
            self.messages.pop_first();
        }
        id
    }

    pub fn get(&self, id: u32) -> Option<&Message> {
        self.messages.get(&id)
    }

    pub fn remove(&mut self, id: u32) -> Option<Message> {
        self.messages.remove(&id)
    }

    /// Drop every message. The id counter keeps counting.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Messages in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.values()
    }

    /// Id of the newest message sent by `sender`.
    pub fn last_from(&self, sender: &User) -> Option<u32> {
        self.messages
            .values()
            .rev()
            .find(|m| &m.sender == sender)
            .map(|m| m.id)
    }

    #[cfg(test)]
    pub(crate) fn starting_at(next_id: u32) -> Self {
        Self {
            next_id,
            ..Self::default()
        }
    }
}
