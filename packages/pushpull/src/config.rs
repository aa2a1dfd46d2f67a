use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Unified config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   config.toml:     [long_poll]
//                    timeout_secs = 30
//
//   env var:         PUSHPULL_LONG_POLL__TIMEOUT_SECS=30   (double underscore = nesting)
//
//   CLI flag:        pushpull server --port 9000            (server section only)

/// How the duplex endpoint sources its replies.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReplyMode {
    /// Send every received frame straight back
    #[default]
    Echo,
    /// Operator types replies on the server's stdin
    Console,
}

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub long_poll: LongPollFileConfig,
    #[serde(default)]
    pub stream: StreamFileConfig,
    #[serde(default)]
    pub duplex: DuplexFileConfig,
    #[serde(default)]
    pub state: StateFileConfig,
    #[serde(default)]
    pub client: ClientFileConfig,
}

/// Listener settings (lives under `[server]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Long-poll tunables (lives under `[long_poll]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LongPollFileConfig {
    #[serde(default = "default_poll_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LongPollFileConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_poll_timeout_secs(),
        }
    }
}

/// Event stream tunables (lives under `[stream]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamFileConfig {
    #[serde(default = "default_stream_interval_ms")]
    pub interval_ms: u64,
}

impl Default for StreamFileConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_stream_interval_ms(),
        }
    }
}

/// Duplex session tunables (lives under `[duplex]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DuplexFileConfig {
    /// Frame that ends a session when either side sends it.
    #[serde(default = "default_terminator")]
    pub terminator: String,
    #[serde(default)]
    pub reply: ReplyMode,
}

impl Default for DuplexFileConfig {
    fn default() -> Self {
        Self {
            terminator: default_terminator(),
            reply: ReplyMode::default(),
        }
    }
}

/// Shared state seed (lives under `[state]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateFileConfig {
    #[serde(default = "default_initial_message")]
    pub initial_message: String,
}

impl Default for StateFileConfig {
    fn default() -> Self {
        Self {
            initial_message: default_initial_message(),
        }
    }
}

/// Client adapter tunables (lives under `[client]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientFileConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_client_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for ClientFileConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            poll_interval_ms: default_client_poll_interval_ms(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_poll_timeout_secs() -> u64 {
    15
}
fn default_stream_interval_ms() -> u64 {
    1000
}
fn default_terminator() -> String {
    "break".to_string()
}
fn default_initial_message() -> String {
    "Initial message".to_string()
}
fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_client_poll_interval_ms() -> u64 {
    1000
}

/// Default location of config.toml: `<config_dir>/pushpull/config.toml`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pushpull")
        .join("config.toml")
}

/// Build a figment that layers: defaults → config.toml → PUSHPULL_* env vars.
///
/// A missing config.toml is not an error; the layer is simply empty.
/// Env vars use double-underscore for nesting into sections:
///   `PUSHPULL_SERVER__PORT=9000`  →  `server.port = 9000`
///   `PUSHPULL_DUPLEX__REPLY=console`  →  `duplex.reply = "console"`
pub fn load_config(config_path: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(config_path))
        .merge(Env::prefixed("PUSHPULL_").split("__"))
}

/// Load and extract the file config in one go.
pub fn load_file_config(config_path: &Path) -> Result<FileConfig> {
    load_config(config_path)
        .extract()
        .with_context(|| format!("Failed to load config from {}", config_path.display()))
}

// =============================================================================
// Runtime config structs (derived from FileConfig, used throughout the server)
// =============================================================================

/// Server configuration for runtime behavior.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// How long a long-poll request parks before returning the "no update" sentinel
    pub long_poll_timeout: Duration,
    /// Gap between two event-stream emissions
    pub stream_interval: Duration,
    pub terminator: String,
    pub reply: ReplyMode,
    pub initial_message: String,
}

impl ServerConfig {
    pub fn from_file(fc: &FileConfig) -> Self {
        Self {
            host: fc.server.host.clone(),
            port: fc.server.port,
            long_poll_timeout: Duration::from_secs(fc.long_poll.timeout_secs),
            stream_interval: Duration::from_millis(fc.stream.interval_ms.max(1)),
            terminator: fc.duplex.terminator.clone(),
            reply: fc.duplex.reply,
            initial_message: fc.state.initial_message.clone(),
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_file(&FileConfig::default())
    }
}

/// Client adapter configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    /// Pause between two long-poll requests
    pub poll_interval: Duration,
    pub terminator: String,
}

impl ClientConfig {
    pub fn from_file(fc: &FileConfig) -> Self {
        Self {
            base_url: fc.client.base_url.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_millis(fc.client.poll_interval_ms),
            terminator: fc.duplex.terminator.clone(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Websocket URL for the duplex endpoint, derived from the HTTP base URL.
    pub fn ws_url(&self) -> String {
        let base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.base_url.clone()
        };
        format!("{}/ws", base)
    }
}
