//! Wire tags and the payloads carried inside the secure tunnel.
//!
//! Every tunnel payload starts with a one-byte message tag. Handshake frames
//! start with a one-byte status (or `INIT` for the very first frame).

use crate::error::ProtocolError;
use crate::types::Color;

pub const STATUS_OK: u8 = 0x00;
pub const STATUS_ERROR: u8 = 0x01;

pub const MSG_INIT: u8 = 0x01;
pub const MSG_TEXT: u8 = 0x02;
pub const MSG_DISCONNECT: u8 = 0x03;
pub const MSG_DELETE: u8 = 0x04;
pub const MSG_ARCHIVE_NOTICE: u8 = 0x05;
pub const MSG_COLORED_TEXT: u8 = 0x06;

/// A decoded tunnel payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    ColoredText { color: Color, text: String },
    Disconnect,
    Delete(u32),
    /// The peer saved the conversation to an archive.
    ArchiveNotice,
}

impl Payload {
    pub fn tag(&self) -> u8 {
        match self {
            Payload::Text(_) => MSG_TEXT,
            Payload::ColoredText { .. } => MSG_COLORED_TEXT,
            Payload::Disconnect => MSG_DISCONNECT,
            Payload::Delete(_) => MSG_DELETE,
            Payload::ArchiveNotice => MSG_ARCHIVE_NOTICE,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![self.tag()];
        match self {
            Payload::Text(text) => out.extend_from_slice(text.as_bytes()),
            Payload::ColoredText { color, text } => {
                out.push(color.as_byte());
                out.extend_from_slice(text.as_bytes());
            }
            Payload::Delete(id) => out.extend_from_slice(&id.to_le_bytes()),
            Payload::Disconnect | Payload::ArchiveNotice => {}
        }
        out
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let (&tag, body) = data
            .split_first()
            .ok_or(ProtocolError::Truncated { min: 1, got: 0 })?;

        match tag {
            MSG_TEXT => Ok(Payload::Text(utf8(body)?)),
            MSG_COLORED_TEXT => {
                let (&color, text) = body.split_first().ok_or(ProtocolError::Truncated {
                    min: 2,
                    got: data.len(),
                })?;
                let color =
                    Color::from_byte(color).ok_or(ProtocolError::UnrecognizedMessage(tag))?;
                Ok(Payload::ColoredText {
                    color,
                    text: utf8(text)?,
                })
            }
            MSG_DISCONNECT => Ok(Payload::Disconnect),
            MSG_DELETE => {
                let id: [u8; 4] = body.get(..4).and_then(|b| b.try_into().ok()).ok_or(
                    ProtocolError::Truncated {
                        min: 5,
                        got: data.len(),
                    },
                )?;
                Ok(Payload::Delete(u32::from_le_bytes(id)))
            }
            MSG_ARCHIVE_NOTICE => Ok(Payload::ArchiveNotice),
            other => Err(ProtocolError::UnrecognizedMessage(other)),
        }
    }
}

fn utf8(bytes: &[u8]) -> Result<String, ProtocolError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidText)
}
