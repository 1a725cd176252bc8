use chrono::Local;
use parley_shared::types::Color;

use crate::log::Message;

/// Turns a message into one line of display text.
pub trait Renderer: Send + Sync {
    fn render(&self, message: &Message) -> String;

    fn render_all<'a>(&self, messages: impl Iterator<Item = &'a Message>) -> String
    where
        Self: Sized,
    {
        messages
            .map(|m| self.render(m))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn local_time(message: &Message) -> String {
    message
        .timestamp
        .with_timezone(&Local)
        .format("%H:%M:%S")
        .to_string()
}

/// `name @ HH:MM:SS: content`. Used for archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainRenderer;

impl Renderer for PlainRenderer {
    fn render(&self, message: &Message) -> String {
        format!(
            "{} @ {}: {}",
            message.sender.name,
            local_time(message),
            message.content
        )
    }
}

/// Terminal rendering: bold colored name, italic time, content in the
/// override color when one was chosen.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiRenderer;

const RESET: &str = "\x1b[0m";

fn ansi_code(color: Color) -> u8 {
    match color {
        Color::Gray => 90,
        Color::White => 97,
        Color::Red => 31,
        Color::Blue => 34,
        Color::Green => 32,
        Color::Magenta => 35,
        Color::Cyan => 36,
        Color::Yellow => 33,
    }
}

impl Renderer for AnsiRenderer {
    fn render(&self, message: &Message) -> String {
        let name = format!(
            "\x1b[1;{}m{}{RESET}",
            ansi_code(message.sender.color),
            message.sender.name
        );
        let time = format!("\x1b[3m{}{RESET}", local_time(message));
        let content = match message.color {
            Some(color) => format!("\x1b[{}m{}{RESET}", ansi_code(color), message.content),
            None => message.content.clone(),
        };
        format!("{name} @ {time}: {content}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use parley_shared::types::{User, UserId};

    fn message(color: Option<Color>) -> Message {
        Message {
            id: 3,
            content: "hello there".to_string(),
            sender: User {
                name: "alice".to_string(),
                color: Color::Red,
                id: UserId("id".to_string()),
            },
            color,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 34, 56).unwrap(),
        }
    }

    #[test]
    fn test_plain_format() {
        let msg = message(None);
        let expected = format!("alice @ {}: hello there", local_time(&msg));
        assert_eq!(PlainRenderer.render(&msg), expected);
        assert_eq!(local_time(&msg).len(), 8);
    }

    #[test]
    fn test_plain_ignores_color() {
        assert_eq!(
            PlainRenderer.render(&message(Some(Color::Cyan))),
            PlainRenderer.render(&message(None))
        );
    }

    #[test]
    fn test_ansi_format() {
        let rendered = AnsiRenderer.render(&message(None));
        assert!(rendered.starts_with("\x1b[1;31malice\x1b[0m @ \x1b[3m"));
        assert!(rendered.ends_with(": hello there"));

        let tinted = AnsiRenderer.render(&message(Some(Color::Cyan)));
        assert!(tinted.ends_with(": \x1b[36mhello there\x1b[0m"));
    }

    #[test]
    fn test_render_all_joins_lines() {
        let msgs = [message(None), message(None)];
        let text = PlainRenderer.render_all(msgs.iter());
        assert_eq!(text.lines().count(), 2);
    }
}
