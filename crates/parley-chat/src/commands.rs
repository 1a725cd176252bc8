//! Operator commands typed as `>name args...`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parley_shared::constants::{ARCHIVE_KDF_ROUNDS, MAX_KDF_ROUNDS};
use parley_shared::keys::fingerprint;
use parley_shared::types::Color;
use zeroize::Zeroizing;

use crate::error::{ChatError, Result};
use crate::room::Chatroom;

pub const COMMAND_PREFIX: char = '>';

/// Source of passwords for commands that need one.
pub trait PasswordPrompt: Send + Sync {
    fn read_password(&self, prompt: &str) -> std::io::Result<Zeroizing<String>>;
}

/// One line of operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    Text(&'a str),
    Command { name: &'a str, args: &'a str },
}

pub fn parse_input(line: &str) -> Input<'_> {
    let Some(rest) = line.trim().strip_prefix(COMMAND_PREFIX) else {
        return Input::Text(line);
    };
    let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    Input::Command {
        name,
        args: args.trim(),
    }
}

/// What the caller should do after a command ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    /// Nothing to show beyond the updated log.
    Silent,
    /// A line to show the operator, not part of the log.
    Notice(String),
    /// The session ended; the caller may keep running.
    Disconnected,
    /// The session ended and the caller should quit.
    Exit,
}

fn usage(text: &str) -> ChatError {
    ChatError::InvalidArguments(format!("usage: {text}"))
}

/// Split off the first whitespace-separated word, keeping the remainder's
/// inner spacing intact.
fn first_word(args: &str) -> (&str, &str) {
    let (word, rest) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
    (word, rest.trim_start())
}

impl Chatroom {
    pub async fn handle_command(
        self: &Arc<Self>,
        name: &str,
        args: &str,
        prompt: &dyn PasswordPrompt,
    ) -> Result<CommandOutput> {
        match name {
            "clear" => {
                self.clear().await;
                Ok(CommandOutput::Silent)
            }
            "disconnect" => {
                self.disconnect().await?;
                Ok(CommandOutput::Disconnected)
            }
            "exit" => {
                self.disconnect().await?;
                Ok(CommandOutput::Exit)
            }
            "peerid" => {
                let peer = self.peer();
                Ok(CommandOutput::Notice(format!(
                    "{} [{}] {}",
                    peer.name,
                    fingerprint(self.tunnel().peer_public_key()),
                    peer.id
                )))
            }
            "delete" => self.delete_command(args).await,
            "timed" => {
                let (delay, text) = first_word(args);
                let delay: u64 = delay
                    .parse()
                    .map_err(|_| usage(">timed <delaySeconds> <text...>"))?;
                if text.is_empty() {
                    return Err(usage(">timed <delaySeconds> <text...>"));
                }
                self.timed_message(text, Duration::from_secs(delay)).await?;
                Ok(CommandOutput::Silent)
            }
            "color" => {
                let (color, text) = first_word(args);
                if color.is_empty() || text.is_empty() {
                    return Err(usage(">color <colorName> <text...>"));
                }
                let color =
                    Color::parse(color).map_err(|e| ChatError::InvalidArguments(e.to_string()))?;
                self.send_colored(text, color).await?;
                Ok(CommandOutput::Silent)
            }
            "archive" => self.archive_command(args, prompt).await,
            other => Err(ChatError::UnrecognizedCommand(other.to_string())),
        }
    }

    async fn delete_command(&self, args: &str) -> Result<CommandOutput> {
        let id = match args {
            "" => self.last_own_message().await.ok_or_else(|| {
                ChatError::InvalidArguments("You have no messages to delete".to_string())
            })?,
            id => id.parse().map_err(|_| usage(">delete [id]"))?,
        };
        if self.delete_message(id).await? {
            Ok(CommandOutput::Silent)
        } else {
            Ok(CommandOutput::Notice(format!("No message with id {id}")))
        }
    }

    async fn archive_command(
        &self,
        args: &str,
        prompt: &dyn PasswordPrompt,
    ) -> Result<CommandOutput> {
        let (dir, rounds) = first_word(args);
        if dir.is_empty() {
            return Err(usage(">archive <dir> [rounds]"));
        }
        let rounds = match rounds {
            "" => ARCHIVE_KDF_ROUNDS,
            n => match n.parse::<u32>() {
                Ok(n) if (1..=MAX_KDF_ROUNDS).contains(&n) => n,
                _ => {
                    return Err(usage(&format!(
                        ">archive <dir> [rounds 1..={MAX_KDF_ROUNDS}]"
                    )))
                }
            },
        };

        let password = prompt
            .read_password("Archive password: ")
            .map_err(ChatError::Prompt)?;
        let confirm = prompt
            .read_password("Confirm password: ")
            .map_err(ChatError::Prompt)?;
        if password != confirm {
            return Err(ChatError::PasswordMismatch);
        }

        let path = self
            .archive(Path::new(dir), password.as_bytes(), rounds)
            .await?;
        Ok(CommandOutput::Notice(format!(
            "Saved archive to {}",
            path.display()
        )))
    }
}
