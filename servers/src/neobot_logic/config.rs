use clap::Parser;
use lib_onebot::BotConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "neobot.conf";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[clap(about = "NeoBot OneBot v11 client", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "NEOBOT_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "NEOBOT_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "NEOBOT_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "NEOBOT_WS_URI", help = "OneBot WebSocket endpoint, e.g. ws://127.0.0.1:3001.")]
    pub ws_uri: Option<String>,

    #[clap(long, env = "NEOBOT_WS_TOKEN", help = "Access token sent as a Bearer Authorization header.")]
    pub ws_token: Option<String>,

    #[clap(long, env = "NEOBOT_RECONNECT_INTERVAL_SECS", help = "Fixed delay in seconds between reconnect attempts.")]
    pub reconnect_interval_secs: Option<u64>,

    #[clap(long, env = "NEOBOT_CALL_TIMEOUT_SECS", help = "Seconds to wait for an API call response.")]
    pub call_timeout_secs: Option<u64>,

    #[clap(long, env = "NEOBOT_COMMAND_PREFIXES", value_delimiter = ',', help = "Comma separated command prefixes.")]
    pub command_prefixes: Option<Vec<String>>,

    #[clap(long, env = "NEOBOT_IGNORE_SELF_MESSAGE", help = "Ignore messages sent by the bot account itself (true/false).")]
    pub ignore_self_message: Option<bool>,

    #[clap(long, env = "NEOBOT_WORKER_THREADS", help = "Maximum number of concurrently running blocking handlers.")]
    pub worker_threads: Option<usize>,

    #[clap(long, env = "NEOBOT_DATA_DIR", help = "Directory holding admin.json and permissions.json.")]
    pub data_dir: Option<PathBuf>,

    #[clap(long, env = "NEOBOT_REDIS_URL", help = "Optional Redis URL for the admin mirror and API cache.")]
    pub redis_url: Option<String>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            ws_uri: other.ws_uri.or(self.ws_uri),
            ws_token: other.ws_token.or(self.ws_token),
            reconnect_interval_secs: other.reconnect_interval_secs.or(self.reconnect_interval_secs),
            call_timeout_secs: other.call_timeout_secs.or(self.call_timeout_secs),
            command_prefixes: other.command_prefixes.or(self.command_prefixes),
            ignore_self_message: other.ignore_self_message.or(self.ignore_self_message),
            worker_threads: other.worker_threads.or(self.worker_threads),
            data_dir: other.data_dir.or(self.data_dir),
            redis_url: other.redis_url.or(self.redis_url),
        }
    }

    fn defaults() -> Config {
        let bot = BotConfig::default();
        Config {
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            ws_uri: Some("ws://127.0.0.1:3001".to_string()),
            reconnect_interval_secs: Some(bot.reconnect_interval_secs),
            call_timeout_secs: Some(bot.call_timeout_secs),
            command_prefixes: Some(bot.command_prefixes),
            ignore_self_message: Some(bot.ignore_self_message),
            worker_threads: Some(bot.worker_threads),
            data_dir: Some(bot.data_dir),
            ..Default::default()
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    /// The library configuration, with library defaults for anything unset.
    pub fn bot_config(&self) -> BotConfig {
        let defaults = BotConfig::default();
        BotConfig {
            ws_uri: self.ws_uri.clone().unwrap_or_default(),
            ws_token: self.ws_token.clone().filter(|t| !t.is_empty()),
            reconnect_interval_secs: self.reconnect_interval_secs.unwrap_or(defaults.reconnect_interval_secs),
            call_timeout_secs: self.call_timeout_secs.unwrap_or(defaults.call_timeout_secs),
            command_prefixes: self.command_prefixes.clone().unwrap_or(defaults.command_prefixes),
            ignore_self_message: self.ignore_self_message.unwrap_or(defaults.ignore_self_message),
            worker_threads: self.worker_threads.unwrap_or(defaults.worker_threads),
            data_dir: self.data_dir.clone().unwrap_or(defaults.data_dir),
            redis_url: self.redis_url.clone().filter(|u| !u.is_empty()),
        }
    }
}

fn read_config_file(path: &Path) -> Option<Config> {
    if !path.exists() {
        log::info!("Config file not found at {}. Using defaults and environment/CLI variables.", path.display());
        return None;
    }
    let Ok(config_str) = fs::read_to_string(path) else {
        log::warn!("Failed to read config file: {}. Falling back to other sources.", path.display());
        return None;
    };
    match serde_json::from_str::<Config>(&config_str) {
        Ok(file_config) => Some(file_config),
        Err(e) => {
            log::warn!("Failed to parse config file {}: {}. Falling back to other sources.", path.display(), e);
            None
        }
    }
}

/// Defaults, then the JSON file, then environment variables and CLI flags.
pub fn load_config_with(cli: Config) -> Config {
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut current_config = Config::defaults();
    if let Some(file_config) = read_config_file(&config_file_path) {
        current_config = current_config.merge(file_config);
    }
    current_config.merge(cli)
}

pub fn load_config() -> Config {
    load_config_with(Config::parse())
}
