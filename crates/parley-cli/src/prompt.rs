//! Terminal input: hidden password prompts and line reading.

use std::io::{self, BufRead};

use anyhow::{bail, Context, Result};
use parley_chat::PasswordPrompt;
use zeroize::Zeroizing;

/// Reads passwords from the controlling terminal without echo.
pub struct TerminalPrompt;

impl PasswordPrompt for TerminalPrompt {
    fn read_password(&self, prompt: &str) -> io::Result<Zeroizing<String>> {
        rpassword::prompt_password(prompt).map(Zeroizing::new)
    }
}

pub fn read_password(prompt: &str) -> Result<Zeroizing<String>> {
    TerminalPrompt
        .read_password(prompt)
        .context("Failed to read password")
}

/// Ask twice and insist the answers match.
pub fn read_new_password(prompt: &str) -> Result<Zeroizing<String>> {
    let password = read_password(prompt)?;
    let confirm = read_password("Confirm password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }
    Ok(password)
}

/// Read one line from stdin, `None` at end of input.
///
/// Each call reads exactly one line on a blocking thread, so no read is left
/// pending on the terminal while a password prompt runs.
pub async fn next_line() -> Result<Option<String>> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        let n = io::stdin().lock().read_line(&mut line)?;
        Ok::<_, io::Error>((n > 0).then(|| line.trim_end_matches(['\r', '\n']).to_string()))
    })
    .await
    .context("Input thread failed")?
    .context("Failed to read input")
}
