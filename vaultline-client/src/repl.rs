//! The line-oriented REPL: enough commands to log in, discover peers,
//! set up a conversation, and exchange messages without a GUI.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, Mutex};

use vaultline_crypto::StreamState;
use vaultline_session::conversation::{self, PeerCrypto, PeerLink, SettingUpGuard};
use vaultline_session::dispatch::ServerEvent;
use vaultline_session::file_transfer::{FileInvite, Receiver as FileReceiver, Sender as FileSender, DEFAULT_CHUNK_SIZE};
use vaultline_session::messaging::{self, Incoming};
use vaultline_session::orchestrator::PeerRoutes;
use vaultline_store::Store;
use vaultline_wire::{sentinel, Flag, Frame, Token};

/// Directory incoming files are saved into, created on first received
/// transfer (mirrors the server's own per-connection file handling).
const FILES_DIR: &str = "./files";

/// An established peer conversation the REPL can send through. Both halves
/// are locked push-then-pull from both this struct's owner and the
/// background task draining `inbound`, so the two never deadlock each other.
struct PeerConversation {
    push: Arc<Mutex<StreamState>>,
    pull: Arc<Mutex<StreamState>>,
    outbound: mpsc::UnboundedSender<Frame>,
}

pub struct App {
    store: Arc<Store>,
    peer_routes: PeerRoutes,
    out_tx: mpsc::UnboundedSender<Frame>,
    events: mpsc::UnboundedReceiver<ServerEvent>,
    self_id: u32,
    token: Token,
    setup_guard: Arc<SettingUpGuard>,
    peers: HashMap<u32, PeerConversation>,
    pending: HashMap<u32, mpsc::Receiver<Frame>>,
}

impl App {
    pub fn new(
        store: Arc<Store>,
        peer_routes: PeerRoutes,
        out_tx: mpsc::UnboundedSender<Frame>,
        events: mpsc::UnboundedReceiver<ServerEvent>,
        self_id: u32,
        token: Token,
    ) -> Self {
        App {
            store,
            peer_routes,
            out_tx,
            events,
            self_id,
            token,
            setup_guard: Arc::new(SettingUpGuard::default()),
            peers: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    pub async fn run(mut self) {
        println!("logged in as user {}. type `help` for commands.", self.self_id);
        let stdin = BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();

        loop {
            print!("> ");
            use std::io::Write;
            let _ = std::io::stdout().flush();

            tokio::select! {
                line = lines.next_line() => {
                    let Ok(Some(line)) = line else { break };
                    if !self.dispatch_command(line.trim()).await {
                        break;
                    }
                }
                event = self.events.recv() => {
                    match event {
                        Some(event) => self.handle_server_event(event),
                        None => {
                            println!("server connection closed.");
                            break;
                        }
                    }
                }
            }
        }
    }

    fn handle_server_event(&self, event: ServerEvent) {
        match event {
            ServerEvent::UsersList(users) => {
                println!("users:");
                for u in users {
                    println!("  {} {} {}", u.id, if u.connected { "online" } else { "offline" }, u.name);
                }
            }
            ServerEvent::Error { message } => {
                println!("server error: {}", String::from_utf8_lossy(&message));
            }
            other => println!("server event: {other:?}"),
        }
    }

    async fn dispatch_command(&mut self, line: &str) -> bool {
        let mut parts = line.split_whitespace();
        match parts.next() {
            None => {}
            Some("quit") | Some("exit") => return false,
            Some("help") => print_help(),
            Some("users") => self.request_users(),
            Some("invite") => {
                let Some(peer_id) = parts.next().and_then(|s| s.parse().ok()) else {
                    println!("usage: invite <peer_id>");
                    return true;
                };
                self.invite(peer_id).await;
            }
            Some("listen") => {
                let Some(peer_id) = parts.next().and_then(|s| s.parse().ok()) else {
                    println!("usage: listen <peer_id>");
                    return true;
                };
                self.listen(peer_id).await;
            }
            Some("accept") => {
                let Some(peer_id) = parts.next().and_then(|s| s.parse().ok()) else {
                    println!("usage: accept <peer_id>");
                    return true;
                };
                self.accept(peer_id).await;
            }
            Some("send") => {
                let Some(peer_id) = parts.next().and_then(|s| s.parse().ok()) else {
                    println!("usage: send <peer_id> <text...>");
                    return true;
                };
                let text: String = parts.collect::<Vec<_>>().join(" ");
                self.send(peer_id, &text).await;
            }
            Some("sendfile") => {
                let Some(peer_id) = parts.next().and_then(|s| s.parse().ok()) else {
                    println!("usage: sendfile <peer_id> <path>");
                    return true;
                };
                let Some(path) = parts.next() else {
                    println!("usage: sendfile <peer_id> <path>");
                    return true;
                };
                self.send_file(peer_id, path).await;
            }
            Some(other) => println!("unknown command `{other}`, type `help`"),
        }
        true
    }

    fn request_users(&self) {
        let frame = Frame::single(Flag::FetchUsers, now_ms(), self.self_id, sentinel::SERVER_DESTINATION, self.token, Vec::new());
        let _ = self.out_tx.send(frame);
    }

    /// Pre-register a relay route for `peer_id` so an incoming invite
    /// (`EXCHANGE_KEYS` with a one-byte marker) has somewhere to land before
    /// `accept` consumes it.
    async fn listen(&mut self, peer_id: u32) {
        let (relay_tx, relay_rx) = mpsc::channel(8);
        self.peer_routes.lock().await.insert(peer_id, relay_tx);
        self.pending.insert(peer_id, relay_rx);
        println!("listening for an invite from {peer_id}");
    }

    async fn accept(&mut self, peer_id: u32) {
        let Some(mut inbound) = self.pending.remove(&peer_id) else {
            println!("not listening for {peer_id}; run `listen {peer_id}` first");
            return;
        };
        let Some(invite_frame) = inbound.recv().await else {
            println!("peer route closed before an invite arrived");
            return;
        };
        if invite_frame.flag != Flag::ExchangeKeys.to_i32() {
            println!("expected an invite, got flag {:#x}", invite_frame.flag);
            return;
        }

        let mut link = PeerLink { outbound: self.out_tx.clone(), inbound, self_id: self.self_id, peer_id, token: self.token };
        match conversation::respond(&mut link, &self.setup_guard, true).await {
            Ok(Some(crypto)) => self.finish_setup(peer_id, link, crypto).await,
            Ok(None) => println!("invite from {peer_id} was denied"),
            Err(e) => println!("conversation setup with {peer_id} failed: {e}"),
        }
    }

    async fn invite(&mut self, peer_id: u32) {
        let (relay_tx, relay_rx) = mpsc::channel(8);
        self.peer_routes.lock().await.insert(peer_id, relay_tx);

        let mut link = PeerLink { outbound: self.out_tx.clone(), inbound: relay_rx, self_id: self.self_id, peer_id, token: self.token };
        match conversation::invite(&mut link, &self.setup_guard).await {
            Ok(crypto) => self.finish_setup(peer_id, link, crypto).await,
            Err(e) => println!("invite to {peer_id} failed: {e}"),
        }
    }

    async fn finish_setup(&mut self, peer_id: u32, link: PeerLink, crypto: PeerCrypto) {
        let mut combined = [0u8; vaultline_crypto::STREAMS_STATES_SIZE];
        combined[..vaultline_crypto::STREAM_STATE_SIZE].copy_from_slice(&crypto.push.to_bytes());
        combined[vaultline_crypto::STREAM_STATE_SIZE..].copy_from_slice(&crypto.pull.to_bytes());
        if let Err(e) = self.store.upsert_conversation(peer_id, &combined) {
            println!("conversation with {peer_id} set up but failed to persist: {e}");
            return;
        }

        let push = Arc::new(Mutex::new(crypto.push));
        let pull = Arc::new(Mutex::new(crypto.pull));
        self.peers.insert(peer_id, PeerConversation { push: push.clone(), pull: pull.clone(), outbound: link.outbound.clone() });

        let store = self.store.clone();
        let mut inbound = link.inbound;
        let self_id = self.self_id;
        tokio::spawn(async move {
            let mut incoming_file: Option<FileReceiver> = None;
            while let Some(frame) = inbound.recv().await {
                if frame.flag != Flag::Proceed.to_i32() {
                    continue;
                }
                let mut push_guard = push.lock().await;
                let mut pull_guard = pull.lock().await;
                let result = messaging::receive_incoming(&store, &push_guard, &mut pull_guard, peer_id, frame.timestamp, frame.payload());
                drop(pull_guard);
                drop(push_guard);

                match result {
                    Ok(Incoming::Text(plaintext)) => {
                        println!("[{peer_id} -> {self_id}] {}", String::from_utf8_lossy(&plaintext));
                    }
                    Ok(Incoming::FileInvite(invite)) => {
                        println!("[{peer_id} -> {self_id}] sending file `{}` ({} bytes)", invite.filename, invite.size);
                        incoming_file = Some(FileReceiver::new(invite));
                    }
                    Ok(Incoming::FileChunk(chunk)) => {
                        let Some(receiver) = incoming_file.as_mut() else {
                            tracing::warn!(peer_id, "file chunk with no preceding invite, dropping");
                            continue;
                        };
                        if let Err(e) = receiver.absorb_chunk(&chunk) {
                            tracing::warn!(peer_id, error = %e, "file transfer failed, discarding");
                            incoming_file = None;
                        }
                    }
                    Ok(Incoming::FileEnd) => {
                        let Some(receiver) = incoming_file.take() else {
                            tracing::warn!(peer_id, "end-of-file marker with no preceding invite, dropping");
                            continue;
                        };
                        let filename = receiver.filename().to_string();
                        match receiver.finish() {
                            Ok(bytes) => save_received_file(&filename, &bytes),
                            Err(e) => println!("file transfer from {peer_id} failed: {e}"),
                        }
                    }
                    Err(e) => tracing::warn!(peer_id, error = %e, "dropping undecryptable frame from peer"),
                }
            }
        });

        println!("conversation with {peer_id} established");
    }

    async fn send(&mut self, peer_id: u32, text: &str) {
        let Some(peer) = self.peers.get(&peer_id) else {
            println!("no conversation with {peer_id}; run `invite {peer_id}` first");
            return;
        };
        let mut push_guard = peer.push.lock().await;
        let pull_guard = peer.pull.lock().await;
        match messaging::prepare_outgoing(&self.store, &mut push_guard, &pull_guard, peer_id, text.as_bytes()) {
            Ok(ciphertext) => {
                drop(pull_guard);
                drop(push_guard);
                let frame = messaging::frame_for(self.self_id, peer_id, self.token, now_ms(), ciphertext);
                let _ = peer.outbound.send(frame);
            }
            Err(e) => println!("failed to send: {e}"),
        }
    }

    async fn send_file(&mut self, peer_id: u32, path: &str) {
        let Some(peer) = self.peers.get(&peer_id) else {
            println!("no conversation with {peer_id}; run `invite {peer_id}` first");
            return;
        };
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                println!("failed to read {path}: {e}");
                return;
            }
        };
        let filename = Path::new(path).file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| path.to_string());
        let invite = match FileInvite::new(data.len() as u64, FileInvite::hash_of(&data), filename) {
            Ok(invite) => invite,
            Err(e) => {
                println!("cannot send {path}: {e}");
                return;
            }
        };

        let mut push_guard = peer.push.lock().await;
        let pull_guard = peer.pull.lock().await;

        let frame = match messaging::prepare_file_invite(&self.store, &mut push_guard, &pull_guard, peer_id, &invite) {
            Ok(ciphertext) => messaging::frame_for(self.self_id, peer_id, self.token, now_ms(), ciphertext),
            Err(e) => {
                println!("failed to send invite: {e}");
                return;
            }
        };
        let _ = peer.outbound.send(frame);

        let mut sender = FileSender::new(&data, DEFAULT_CHUNK_SIZE);
        while let Some(chunk) = sender.next_chunk() {
            match messaging::prepare_file_chunk(&self.store, &mut push_guard, &pull_guard, peer_id, chunk) {
                Ok(ciphertext) => {
                    let frame = messaging::frame_for(self.self_id, peer_id, self.token, now_ms(), ciphertext);
                    let _ = peer.outbound.send(frame);
                }
                Err(e) => {
                    println!("file transfer to {peer_id} failed mid-send: {e}");
                    return;
                }
            }
        }

        match messaging::prepare_file_end(&self.store, &mut push_guard, &pull_guard, peer_id) {
            Ok(ciphertext) => {
                let frame = messaging::frame_for(self.self_id, peer_id, self.token, now_ms(), ciphertext);
                let _ = peer.outbound.send(frame);
            }
            Err(e) => println!("failed to send end-of-file marker: {e}"),
        }
    }
}

/// Write a received file into [`FILES_DIR`], creating it on first use, named
/// `{epoch_ms}_{original_name}` so repeated transfers of the same filename
/// never collide.
fn save_received_file(filename: &str, bytes: &[u8]) {
    if let Err(e) = std::fs::create_dir_all(FILES_DIR) {
        println!("failed to create {FILES_DIR}: {e}");
        return;
    }
    let path = Path::new(FILES_DIR).join(format!("{}_{}", now_ms(), filename));
    match std::fs::write(&path, bytes) {
        Ok(()) => println!("saved incoming file to {}", path.display()),
        Err(e) => println!("failed to save incoming file: {e}"),
    }
}

fn print_help() {
    println!("commands:");
    println!("  users                 request the current user list");
    println!("  listen <peer_id>      pre-register to receive an invite from a peer");
    println!("  accept <peer_id>      accept a pending invite from a peer");
    println!("  invite <peer_id>      start a conversation with a peer");
    println!("  send <peer_id> <text> send a message over an established conversation");
    println!("  sendfile <peer_id> <path> send a file over an established conversation");
    println!("  quit                  disconnect and exit");
}

fn now_ms() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}
