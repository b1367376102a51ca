//! vaultline — line-oriented CLI client.
//!
//! Loads `options.txt` from the current directory (writing a default one if
//! absent), connects to the configured server, runs the handshake and login,
//! then hands off to a small REPL for discovering peers and exchanging
//! messages.

mod config;
mod repl;

use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};

use vaultline_crypto::HashState;
use vaultline_session::auth::{pack_credentials, PASSWORD_FIELD_SIZE};
use vaultline_session::dispatch::ServerEvent;
use vaultline_session::handshake;
use vaultline_session::orchestrator::{outbound_socket_from_write_half, spawn_network_poll_task, spawn_worker_task};
use vaultline_store::Store;
use vaultline_wire::{sentinel, Flag, Frame};
use zeroize::Zeroize;

use config::{Config, Credentials};

const OPTIONS_PATH: &str = "options.txt";
const STORE_PATH: &str = "vaultline.sqlite3";
const LOGIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "vaultline=info".to_string());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run().await {
        eprintln!("vaultline: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let host_id = config::host_id();
    let mut config = Config::load_or_default(OPTIONS_PATH, &host_id)?;

    tracing::info!(host = %config.host, port = config.port, "connecting");
    let mut stream = TcpStream::connect((config.host, config.port)).await?;

    let server_streams = handshake::perform(&mut stream, &config.server_signing_key).await?;
    tracing::info!("handshake complete");

    let (read_half, write_half) = tokio::io::split(stream);
    let outbound = Arc::new(outbound_socket_from_write_half(write_half, server_streams.push));
    let peer_routes = Arc::new(Mutex::new(HashMap::new()));
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();

    let _poll_task = spawn_network_poll_task(read_half, server_streams.pull, config.server_signing_key, peer_routes.clone(), events_tx);

    // Actions sent here are forwarded to the serialized outbound socket by
    // the worker task; the REPL and the login step below both just enqueue
    // frames and never touch the socket directly.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Frame>();
    let (actions_tx, actions_rx) = mpsc::unbounded_channel();
    let _worker_task = spawn_worker_task(actions_rx);
    {
        let outbound = outbound.clone();
        actions_tx
            .send(vaultline_session::orchestrator::Action::now(async move {
                while let Some(frame) = out_rx.recv().await {
                    if let Err(e) = outbound.send(&frame).await {
                        tracing::warn!(error = %e, "failed to send queued frame");
                        break;
                    }
                }
            }))
            .ok();
    }

    let had_saved_credentials = config.credentials.is_some();
    let mut credentials = match config.credentials.take() {
        Some(c) => c,
        None => prompt_credentials()?,
    };

    let (self_id, token) = log_in(&out_tx, &mut events_rx, &credentials).await?;
    tracing::info!(user_id = self_id, "logged in");

    if !had_saved_credentials && prompt("save these credentials for next time? [y/N] ")?.eq_ignore_ascii_case("y") {
        config::Config::save_credentials(OPTIONS_PATH, &host_id, &credentials)?;
    }

    let store = Arc::new(Store::open(STORE_PATH, credentials.password.as_bytes())?);
    credentials.password.zeroize();

    let app = repl::App::new(store, peer_routes, out_tx, events_rx, self_id, token);
    app.run().await;

    Ok(())
}

async fn log_in(
    out_tx: &mpsc::UnboundedSender<Frame>,
    events_rx: &mut mpsc::UnboundedReceiver<ServerEvent>,
    credentials: &Credentials,
) -> Result<(u32, vaultline_wire::Token), Box<dyn std::error::Error>> {
    let body = pack_credentials(&credentials.username, &password_field(&credentials.password));
    let frame = Frame::anonymous(Flag::LogIn, now_ms(), sentinel::SERVER_DESTINATION, body);
    out_tx.send(frame).map_err(|_| "outbound queue closed before login could be sent")?;

    let event = tokio::time::timeout(LOGIN_TIMEOUT, events_rx.recv())
        .await
        .map_err(|_| "timed out waiting for the server to respond to LOG_IN")?
        .ok_or("server connection closed during login")?;

    match event {
        ServerEvent::LoggedIn { user_id, token } => Ok((user_id, token)),
        ServerEvent::Unauthenticated => Err("login rejected: unauthenticated".into()),
        ServerEvent::AccessDenied => Err("login rejected: access denied".into()),
        ServerEvent::Error { message } => Err(format!("server error during login: {}", String::from_utf8_lossy(&message)).into()),
        other => Err(format!("unexpected server response to login: {other:?}").into()),
    }
}

/// The wire's `password` field is a 16-byte pre-hash of the real password,
/// never the password itself; reusing the store's password-derived-key
/// primitive for this is a deliberate overload (see DESIGN.md) rather than a
/// second hand-rolled hash.
fn password_field(password: &str) -> [u8; PASSWORD_FIELD_SIZE] {
    let mut hasher = HashState::init();
    hasher.update(password.as_bytes());
    let mut digest = hasher.finish();
    let mut field = [0u8; PASSWORD_FIELD_SIZE];
    field.copy_from_slice(&digest[..PASSWORD_FIELD_SIZE]);
    digest.zeroize();
    field
}

fn prompt_credentials() -> io::Result<Credentials> {
    let username = prompt("username: ")?;
    let password = prompt("password: ")?;
    Ok(Credentials { username, password })
}

fn prompt(msg: &str) -> io::Result<String> {
    print!("{msg}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn now_ms() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}
