//! The interactive chat loop.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use parley_chat::{
    parse_input, AnsiRenderer, ChatError, ChatEvent, Chatroom, CommandOutput, Input,
};
use parley_net::Tunnel;
use tracing::{debug, warn};

use crate::prompt::{next_line, TerminalPrompt};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

async fn redraw(room: &Chatroom) {
    println!("{CLEAR_SCREEN}{}", room.render_log().await);
}

/// Run a chat over `tunnel` until either side leaves or input ends.
pub async fn run(tunnel: Tunnel) -> Result<()> {
    let room = Arc::new(Chatroom::new(tunnel, AnsiRenderer));
    chat(room, next_line).await
}

/// The loop behind [`run`], reading operator lines from `next_line`.
async fn chat<F, Fut>(room: Arc<Chatroom>, mut next_line: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<String>>>,
{
    println!(
        "Connected to {}. Type to chat, >exit to leave.",
        room.peer().name
    );

    let mut receiver = tokio::spawn({
        let room = room.clone();
        async move {
            loop {
                match room.await_message().await {
                    Ok(ChatEvent::Disconnected) => {
                        redraw(&room).await;
                        println!("{} left the chat.", room.peer().name);
                        break;
                    }
                    Ok(event) => {
                        debug!(?event, "Handled inbound message");
                        redraw(&room).await;
                    }
                    Err(ChatError::Inactive) => break,
                    Err(e) => warn!(error = %e, "Dropped inbound message"),
                }
            }
        }
    });

    // Set once the receive loop ends, so the handle is never polled twice.
    let mut received = None;
    while room.is_active() {
        let line = tokio::select! {
            line = next_line() => line?,
            done = &mut receiver => {
                received = Some(done);
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        let result = match parse_input(&line) {
            Input::Text(text) if text.trim().is_empty() => continue,
            Input::Text(text) => room.send_message(text).await.map(|_| CommandOutput::Silent),
            Input::Command { name, args } => room.handle_command(name, args, &TerminalPrompt).await,
        };

        match result {
            Ok(CommandOutput::Silent) => redraw(&room).await,
            Ok(CommandOutput::Notice(text)) => println!("{text}"),
            Ok(CommandOutput::Disconnected) => println!("Disconnected."),
            Ok(CommandOutput::Exit) => break,
            Err(e) => println!("error: {e}"),
        }
    }

    room.disconnect().await?;
    let done = match received {
        Some(done) => done,
        None => receiver.await,
    };
    if let Err(e) = done {
        warn!(error = %e, "Receiver task failed");
    }
    Ok(())
}
