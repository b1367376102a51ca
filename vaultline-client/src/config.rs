//! `options.txt`: a line-oriented `key=value` configuration file.
//!
//! No crate in the stack specializes in this exact format, so it's parsed
//! by hand — the same reasoning that keeps the rest of this crate on
//! `vaultline-crypto`/`vaultline-wire`/`tokio`/`tracing` rather than reaching
//! for a generic config crate nothing else here needs.

use std::fmt;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

use vaultline_crypto::{base64_decode, base64_encode, derive_key_from_password, open, seal, KEY_SIZE};

/// A vaultline server's pinned Ed25519 signing public key, used to verify
/// every signed value the server sends during the handshake (§4.4.2) and
/// every server-origin frame token thereafter.
pub const DEFAULT_SERVER_SIGNING_KEY: [u8; KEY_SIZE] = [
    0x1f, 0x3a, 0x7c, 0xe2, 0x09, 0x5d, 0x8b, 0x44, 0x6e, 0xb1, 0xd7, 0x02, 0x9f, 0x5c, 0x33, 0x8a,
    0x6a, 0x11, 0xc4, 0x70, 0x2b, 0x9e, 0xdd, 0x57, 0x03, 0x8f, 0x6b, 0xa4, 0x1d, 0x92, 0xe6, 0x04,
];

/// A 16-byte value identifying this machine, used to seal auto-login
/// credentials to the host that saved them.
pub fn host_id() -> Vec<u8> {
    if let Ok(id) = fs::read("/etc/machine-id") {
        let trimmed: Vec<u8> = id.into_iter().filter(|b| !b.is_ascii_whitespace()).collect();
        if !trimmed.is_empty() {
            return trimmed;
        }
    }
    let mut bytes = [0u8; 16];
    getrandom::getrandom(&mut bytes).expect("getrandom failed");
    bytes.to_vec()
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    MissingKey(&'static str),
    Malformed { key: &'static str, reason: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error reading options.txt: {e}"),
            Self::MissingKey(k) => write!(f, "options.txt is missing required key `{k}`"),
            Self::Malformed { key, reason } => write!(f, "options.txt key `{key}` is malformed: {reason}"),
        }
    }
}
impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Saved auto-login credentials, sealed under a key derived from the local
/// host id so the file alone (without this machine) is useless.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub admin: bool,
    pub host: Ipv4Addr,
    pub port: u16,
    pub server_signing_key: [u8; KEY_SIZE],
    pub credentials: Option<Credentials>,
    pub theme: u8,
    pub language: u8,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            admin: false,
            host: Ipv4Addr::new(127, 0, 0, 1),
            port: 7777,
            server_signing_key: DEFAULT_SERVER_SIGNING_KEY,
            credentials: None,
            theme: 0,
            language: 0,
        }
    }
}

impl Config {
    /// Load `path`, writing and opening a fresh default file if it doesn't
    /// exist yet.
    pub fn load_or_default(path: impl AsRef<Path>, host_id: &[u8]) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            let defaults = Config::default();
            fs::write(path, defaults.render())?;
            tracing::info!(path = %path.display(), "wrote a default options.txt");
            return Ok(defaults);
        }
        let text = fs::read_to_string(path)?;
        Config::parse(&text, host_id)
    }

    fn parse(text: &str, host_id: &[u8]) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        let mut saw_host = false;
        let mut saw_port = false;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else { continue };
            let (key, value) = (key.trim(), value.trim());

            match key {
                "admin" => config.admin = value.eq_ignore_ascii_case("true"),
                "host" => {
                    config.host = value
                        .parse()
                        .map_err(|_| ConfigError::Malformed { key: "host", reason: "not a dotted-quad address" })?;
                    saw_host = true;
                }
                "port" => {
                    config.port = value
                        .parse()
                        .map_err(|_| ConfigError::Malformed { key: "port", reason: "not a decimal port number" })?;
                    saw_port = true;
                }
                "sspk" => config.server_signing_key = parse_sspk(value)?,
                "credentials" => config.credentials = Some(parse_credentials(value, host_id)?),
                "theme" => config.theme = value.parse().unwrap_or(0),
                "language" => config.language = value.parse().unwrap_or(0),
                other => tracing::debug!(key = other, "ignoring unrecognized options.txt key"),
            }
        }

        if !saw_host {
            return Err(ConfigError::MissingKey("host"));
        }
        if !saw_port {
            return Err(ConfigError::MissingKey("port"));
        }
        Ok(config)
    }

    /// Render as `options.txt` text, sealing `credentials` (if present)
    /// under `host_id`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("admin={}\n", self.admin));
        out.push_str(&format!("host={}\n", self.host));
        out.push_str(&format!("port={}\n", self.port));
        out.push_str(&format!(
            "sspk={}\n",
            self.server_signing_key.iter().map(u8::to_string).collect::<Vec<_>>().join(",")
        ));
        out.push_str(&format!("theme={}\n", self.theme));
        out.push_str(&format!("language={}\n", self.language));
        out
    }

    /// Persist `credentials` into `path`'s `options.txt`, sealed under
    /// `host_id`, enabling auto-login on the next run.
    pub fn save_credentials(
        path: impl AsRef<Path>,
        host_id: &[u8],
        credentials: &Credentials,
    ) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = if path.exists() { fs::read_to_string(path)? } else { String::new() };

        let key = derive_key_from_password(host_id);
        let plaintext = format!("{}\u{0}{}", credentials.username, credentials.password);
        let sealed = seal(&key, plaintext.as_bytes());
        let line = format!("credentials={}", base64_encode(&sealed));

        let mut kept: Vec<&str> = text.lines().filter(|l| !l.trim_start().starts_with("credentials=")).collect();
        kept.push(&line);
        fs::write(path, kept.join("\n") + "\n")?;
        Ok(())
    }
}

fn parse_sspk(value: &str) -> Result<[u8; KEY_SIZE], ConfigError> {
    let mut key = [0u8; KEY_SIZE];
    let mut count = 0;
    for (i, part) in value.split(',').enumerate() {
        if i >= KEY_SIZE {
            return Err(ConfigError::Malformed { key: "sspk", reason: "more than 32 bytes" });
        }
        key[i] = part
            .trim()
            .parse()
            .map_err(|_| ConfigError::Malformed { key: "sspk", reason: "not a decimal byte" })?;
        count += 1;
    }
    if count != KEY_SIZE {
        return Err(ConfigError::Malformed { key: "sspk", reason: "expected exactly 32 comma-separated bytes" });
    }
    Ok(key)
}

fn parse_credentials(value: &str, host_id: &[u8]) -> Result<Credentials, ConfigError> {
    let sealed =
        base64_decode(value).map_err(|_| ConfigError::Malformed { key: "credentials", reason: "not valid base64" })?;
    let key = derive_key_from_password(host_id);
    let plaintext =
        open(&key, &sealed).map_err(|_| ConfigError::Malformed { key: "credentials", reason: "failed to unseal" })?;
    let text = String::from_utf8(plaintext)
        .map_err(|_| ConfigError::Malformed { key: "credentials", reason: "not valid utf-8 after unsealing" })?;
    let (username, password) = text
        .split_once('\u{0}')
        .ok_or(ConfigError::Malformed { key: "credentials", reason: "missing username/password separator" })?;
    Ok(Credentials { username: username.to_string(), password: password.to_string() })
}
