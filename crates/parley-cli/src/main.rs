//! # parley
//!
//! Direct, end-to-end encrypted chat between two peers.
//!
//! - `parley init <dir>` creates a long-term RSA keypair
//! - `parley await` waits for a peer on the handshake port
//! - `parley connect <host>` dials a waiting peer
//! - `parley read-archive <file>` decrypts a saved conversation
//!
//! Ports, bind address and timeouts come from `PARLEY_*` environment
//! variables; see `parley_net::NetConfig`.

mod prompt;
mod session;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use parley_chat::decrypt_archive;
use parley_net::{await_peer, connect_peer, NetConfig};
use parley_shared::constants::RSA_KEY_BITS;
use parley_shared::error::KeyError;
use parley_shared::keys::KeyPair;
use parley_shared::types::{Color, User};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::prompt::{read_new_password, read_password};

#[derive(Parser)]
#[command(name = "parley")]
#[command(version)]
#[command(about = "Peer-to-peer encrypted chat over plain TCP")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a keypair into a directory (prv.pem and pub.pem)
    Init {
        /// Directory to write the keys to
        dir: PathBuf,

        /// Encrypt the private key with a password
        #[arg(short, long)]
        password: bool,

        /// RSA modulus size in bits
        #[arg(long, default_value_t = RSA_KEY_BITS)]
        bits: usize,
    },

    /// Wait for a peer to connect
    Await {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Connect to a waiting peer
    Connect {
        /// Host name or IP address of the peer
        host: String,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Decrypt and print an archive file
    ReadArchive {
        /// Path to the .arc file
        file: PathBuf,
    },
}

#[derive(Args)]
struct SessionArgs {
    /// Directory holding prv.pem and pub.pem
    #[arg(short, long, default_value = "keys")]
    keys: PathBuf,

    /// Display name shown to the peer (max 64 bytes)
    #[arg(short, long)]
    name: String,

    /// Display color: gray, white, red, blue, green, magenta, cyan, yellow
    #[arg(short, long, default_value = "")]
    color: String,
}

fn main() -> Result<()> {
    // Logs go to stderr so they do not interleave with the redrawn chat.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,parley=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let result = runtime.block_on(run(cli));
    // A stdin read left pending when the peer hung up must not keep us alive.
    runtime.shutdown_background();
    result
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init {
            dir,
            password,
            bits,
        } => init(&dir, password, bits),
        Commands::Await { session: args } => {
            let config = NetConfig::from_env();
            info!(?config, "Loaded configuration");
            let (keys, user) = load_identity(&args)?;
            let tunnel = await_peer(&keys, &user, &config).await?;
            session::run(tunnel).await
        }
        Commands::Connect {
            host,
            session: args,
        } => {
            let config = NetConfig::from_env();
            info!(?config, "Loaded configuration");
            let (keys, user) = load_identity(&args)?;
            let tunnel = connect_peer(&host, &keys, &user, &config)
                .await
                .with_context(|| format!("Failed to connect to {host}"))?;
            session::run(tunnel).await
        }
        Commands::ReadArchive { file } => {
            let password = read_password("Archive password: ")?;
            let text = decrypt_archive(&file, password.as_bytes())
                .with_context(|| format!("Failed to read {}", file.display()))?;
            println!("{text}");
            Ok(())
        }
    }
}

fn init(dir: &Path, encrypt: bool, bits: usize) -> Result<()> {
    if dir.join(parley_shared::constants::PRIVATE_KEY_FILE).exists() {
        bail!("{} already holds a keypair", dir.display());
    }
    let password = if encrypt {
        Some(read_new_password("Key password: ")?)
    } else {
        None
    };

    println!("Generating {bits}-bit RSA keypair...");
    let keys = KeyPair::generate(bits)?;
    keys.save(dir, password.as_ref().map(|p| p.as_bytes()))
        .with_context(|| format!("Failed to write keys to {}", dir.display()))?;
    println!("Keys written to {} (fingerprint {})", dir.display(), keys.fingerprint());
    Ok(())
}

fn load_identity(args: &SessionArgs) -> Result<(KeyPair, User)> {
    let keys = match KeyPair::load(&args.keys, None) {
        Err(KeyError::PasswordRequired) => {
            let password = read_password("Key password: ")?;
            KeyPair::load(&args.keys, Some(password.as_bytes()))
        }
        other => other,
    }
    .with_context(|| format!("Failed to load keys from {}", args.keys.display()))?;

    let color = Color::parse(&args.color)?;
    let user = User::new(args.name.clone(), color, &keys)?;
    info!(name = %user.name, fingerprint = %keys.fingerprint(), "Loaded identity");
    Ok((keys, user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_connect_args() {
        let cli = Cli::try_parse_from([
            "parley", "connect", "10.0.0.2", "--name", "alice", "--color", "red",
        ])
        .unwrap();
        let Commands::Connect { host, session } = cli.command else {
            panic!("expected connect");
        };
        assert_eq!(host, "10.0.0.2");
        assert_eq!(session.name, "alice");
        assert_eq!(session.keys, PathBuf::from("keys"));
        assert_eq!(Color::parse(&session.color).unwrap(), Color::Red);
    }

    #[test]
    fn test_init_defaults() {
        let cli = Cli::try_parse_from(["parley", "init", "mykeys"]).unwrap();
        let Commands::Init { dir, password, bits } = cli.command else {
            panic!("expected init");
        };
        assert_eq!(dir, PathBuf::from("mykeys"));
        assert!(!password);
        assert_eq!(bits, RSA_KEY_BITS);
    }

    #[test]
    fn test_name_required() {
        assert!(Cli::try_parse_from(["parley", "await"]).is_err());
    }
}
