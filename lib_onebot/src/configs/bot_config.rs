use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_reconnect_interval() -> u64 {
    5
}

fn default_call_timeout() -> u64 {
    30
}

fn default_prefixes() -> Vec<String> {
    vec!["/".to_string()]
}

fn default_worker_threads() -> usize {
    10
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

/// # Bot Configuration
///
/// Field names follow the camelCase JSON config file layout.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BotConfig {
    /// OneBot WebSocket endpoint, e.g. `ws://127.0.0.1:3001`.
    #[serde(default)]
    pub ws_uri: String,
    /// Optional access token sent as `Authorization: Bearer <token>`.
    #[serde(default)]
    pub ws_token: Option<String>,
    /// Fixed delay between reconnect attempts.
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_secs: u64,
    /// How long a `call` waits for its response.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
    /// Accepted command prefixes, tested in order.
    #[serde(default = "default_prefixes")]
    pub command_prefixes: Vec<String>,
    /// Drop message events sent by the bot's own account.
    #[serde(default)]
    pub ignore_self_message: bool,
    /// Upper bound on concurrently running blocking handlers.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Directory holding `admin.json` and `permissions.json`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Optional Redis URL for the admin mirror and the API cache.
    #[serde(default)]
    pub redis_url: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            ws_uri: String::new(),
            ws_token: None,
            reconnect_interval_secs: default_reconnect_interval(),
            call_timeout_secs: default_call_timeout(),
            command_prefixes: default_prefixes(),
            ignore_self_message: false,
            worker_threads: default_worker_threads(),
            data_dir: default_data_dir(),
            redis_url: None,
        }
    }
}

impl BotConfig {
    /// Checks the invariants the rest of the crate relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ws_uri.trim().is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        if self.command_prefixes.is_empty() {
            return Err(ConfigError::NoPrefixes);
        }
        if self.command_prefixes.iter().any(|p| p.is_empty()) {
            return Err(ConfigError::EmptyPrefix);
        }
        if self.call_timeout_secs == 0 {
            return Err(ConfigError::ZeroValue("callTimeoutSecs"));
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::ZeroValue("workerThreads"));
        }
        Ok(())
    }

    /// The subset of settings the transport needs, as durations.
    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            uri: self.ws_uri.clone(),
            token: self.ws_token.clone().filter(|t| !t.is_empty()),
            reconnect_delay: Duration::from_secs(self.reconnect_interval_secs),
            call_timeout: Duration::from_secs(self.call_timeout_secs),
        }
    }
}

/// Connection parameters for [`crate::transport::OneBotClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub uri: String,
    pub token: Option<String>,
    pub reconnect_delay: Duration,
    pub call_timeout: Duration,
}
