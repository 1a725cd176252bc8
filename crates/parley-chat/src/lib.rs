//! # parley-chat
//!
//! The chat session layered on a `parley-net` tunnel: a bounded message log,
//! inbound event handling, operator commands, rendering, and
//! password-encrypted archives.

pub mod archive;
pub mod commands;
pub mod log;
pub mod render;
pub mod room;

mod error;

pub use archive::{archive_chat, decrypt_archive};
pub use commands::{parse_input, CommandOutput, Input, PasswordPrompt};
pub use error::{ArchiveError, ChatError};
pub use log::{Message, MessageLog};
pub use render::{AnsiRenderer, PlainRenderer, Renderer};
pub use room::{ChatEvent, Chatroom};
