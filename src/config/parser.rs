use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

use crate::bridge::RoomMap;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub irc: IrcConfig,
    pub matrix: MatrixConfig,
    pub bridge: BridgeConfig,
    pub paste: PasteConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IrcConfig {
    pub server: String,
    #[serde(default = "default_irc_port")]
    pub port: u16,
    #[serde(default = "default_use_tls")]
    pub use_tls: bool,
    pub nickname: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub realname: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub nickserv_password: Option<String>,
    #[serde(default = "default_rejoin_interval_secs")]
    pub rejoin_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatrixConfig {
    pub homeserver_url: String,
    pub user_id: String,
    pub access_token: String,
    #[serde(default = "default_sync_timeout_ms")]
    pub sync_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BridgeConfig {
    /// Ordered `(irc channel, matrix room id)` pairs.
    pub mapping: Vec<(String, String)>,
    #[serde(default = "default_nick_store_path")]
    pub nick_store_path: String,
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    #[serde(default = "default_reply_lookup_timeout_ms")]
    pub reply_lookup_timeout_ms: u64,
    #[serde(default = "default_display_name_suffix_pattern")]
    pub display_name_suffix_pattern: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PasteConfig {
    pub endpoint: String,
    #[serde(default = "default_paste_filename")]
    pub filename: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(alias = "console", default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    #[serde(default = "default_metrics_bind_address")]
    pub bind_address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
            bind_address: default_metrics_bind_address(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content)
    }

    pub fn load_from_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = serde_yaml::from_str(content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.irc.server.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "irc.server cannot be empty".to_string(),
            ));
        }

        if self.irc.nickname.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "irc.nickname cannot be empty".to_string(),
            ));
        }

        if self.irc.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "irc.port must be between 1 and 65535".to_string(),
            ));
        }

        if self.irc.rejoin_interval_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "irc.rejoin_interval_secs must be greater than zero".to_string(),
            ));
        }

        if Url::parse(&self.matrix.homeserver_url).is_err() {
            return Err(ConfigError::InvalidConfig(format!(
                "matrix.homeserver_url is not a valid url: {}",
                self.matrix.homeserver_url
            )));
        }

        if !self.matrix.user_id.starts_with('@') || !self.matrix.user_id.contains(':') {
            return Err(ConfigError::InvalidConfig(format!(
                "matrix.user_id must look like @user:server, got {}",
                self.matrix.user_id
            )));
        }

        if self.matrix.access_token.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "matrix.access_token cannot be empty".to_string(),
            ));
        }

        if Url::parse(&self.paste.endpoint).is_err() {
            return Err(ConfigError::InvalidConfig(format!(
                "paste.endpoint is not a valid url: {}",
                self.paste.endpoint
            )));
        }

        if self.bridge.mapping.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "bridge.mapping must contain at least one channel/room pair".to_string(),
            ));
        }

        if let Err(err) = regex::Regex::new(&self.bridge.display_name_suffix_pattern) {
            return Err(ConfigError::InvalidConfig(format!(
                "bridge.display_name_suffix_pattern does not compile: {err}"
            )));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "metrics.port must be between 1 and 65535".to_string(),
            ));
        }

        RoomMap::from_pairs(&self.bridge.mapping)?;

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("IRC_BRIDGE_MATRIX_ACCESS_TOKEN") {
            self.matrix.access_token = value;
        }
        if let Ok(value) = std::env::var("IRC_BRIDGE_IRC_PASSWORD") {
            self.irc.password = Some(value);
        }
        if let Ok(value) = std::env::var("IRC_BRIDGE_NICKSERV_PASSWORD") {
            self.irc.nickserv_password = Some(value);
        }
    }
}

fn default_irc_port() -> u16 {
    6697
}

fn default_use_tls() -> bool {
    true
}

fn default_rejoin_interval_secs() -> u64 {
    300
}

fn default_sync_timeout_ms() -> u64 {
    30000
}

fn default_nick_store_path() -> String {
    "nicknames.json".to_string()
}

fn default_stale_after_secs() -> u64 {
    (crate::matrix::AGE_LIMIT_MS / 1000) as u64
}

fn default_reply_lookup_timeout_ms() -> u64 {
    5000
}

fn default_display_name_suffix_pattern() -> String {
    r"\s*\((?:IRC|Telegram|Discord|Slack|Signal|WhatsApp)\)$".to_string()
}

fn default_paste_filename() -> String {
    "message.txt".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_metrics_port() -> u16 {
    9001
}

fn default_metrics_bind_address() -> String {
    "127.0.0.1".to_string()
}
