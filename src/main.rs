//! Entry point for `reliable-udp`.
//!
//! Parses CLI arguments and dispatches into either **server** or **client**
//! mode.  All protocol work is delegated to library modules; `main.rs` owns
//! only process setup (logging, key loading, argument parsing).

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use reliable_udp::config::{SharedSecret, DEFAULT_KEY_FILE, LOCALHOST};
use reliable_udp::{receive, send_reliable};

/// How long each server-side receive attempt waits for a message.
const SERVER_WAIT: Duration = Duration::from_secs(10);

/// How many times client mode delivers the entered message.
const CLIENT_BURST: usize = 10;

/// Confirmed single-message delivery over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Path to the shared-secret key file.
    #[arg(long, default_value = DEFAULT_KEY_FILE)]
    key_file: PathBuf,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Listen for data messages and acknowledge each delivery.
    Server {
        /// Local port to listen on.
        port: u16,
    },
    /// Read a message from stdin and deliver it to a local server.
    Client {
        /// Server port to deliver to.
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    let secret = SharedSecret::load(&cli.key_file)
        .with_context(|| format!("loading shared secret from {}", cli.key_file.display()))?;

    match cli.mode {
        Mode::Server { port } => {
            log::info!("listening on port {port}");
            server(port, &secret).await;
        }
        Mode::Client { port } => client(port, &secret).await?,
    }
    Ok(())
}

/// Accept deliveries forever, logging each payload (or failed attempt).
async fn server(port: u16, secret: &SharedSecret) {
    loop {
        match receive(port, SERVER_WAIT, secret).await {
            Ok(payload) => log::info!("received: {}", String::from_utf8_lossy(&payload)),
            Err(e) => log::warn!("receive attempt failed: {e}"),
        }
    }
}

/// Read one message from stdin and deliver it [`CLIENT_BURST`] times.
async fn client(port: u16, secret: &SharedSecret) -> Result<()> {
    println!("Enter the message to deliver:");
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("reading message from stdin")?;
    // One whitespace-delimited token is the message; the rest is ignored.
    let payload = input
        .split_whitespace()
        .next()
        .context("no message entered")?
        .as_bytes()
        .to_vec();

    for attempt in 1..=CLIENT_BURST {
        match send_reliable(&payload, LOCALHOST, LOCALHOST, port, secret).await {
            Ok(()) => log::info!("delivery {attempt}/{CLIENT_BURST} confirmed"),
            Err(e) => log::warn!("delivery {attempt}/{CLIENT_BURST} failed: {e}"),
        }
    }
    Ok(())
}
