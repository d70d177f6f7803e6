//! Starwatch configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, StarwatchError};

/// Longest accepted poll interval (one week).
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StarwatchConfig {
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl StarwatchConfig {
    /// Load config from the default path (~/.starwatch/config.toml), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var("STARWATCH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_path());
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a specific path. No environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| StarwatchError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| StarwatchError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the given path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| StarwatchError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Starwatch home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".starwatch")
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get("GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(token) = get("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Some(token) = get("STARWATCH_TRIGGER_TOKEN") {
            self.gateway.trigger_token = Some(token);
        }
        if let Some(path) = get("STARWATCH_DB") {
            self.store.path = path;
        }
        if let Some(raw) = get("CHECK_INTERVAL_MINUTES") {
            match raw.trim().parse::<u64>() {
                Ok(minutes) => self.poller.interval_minutes = minutes,
                Err(_) => tracing::warn!("⚠️ Ignoring invalid CHECK_INTERVAL_MINUTES={raw}"),
            }
        }
        if let Some(raw) = get("PORT") {
            match raw.trim().parse::<u16>() {
                Ok(port) => self.gateway.port = port,
                Err(_) => tracing::warn!("⚠️ Ignoring invalid PORT={raw}"),
            }
        }
    }

    /// Reject values the poller cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.poller.batch_size == 0 {
            return Err(StarwatchError::Config("poller.batch_size must be at least 1".into()));
        }
        if self.poller.interval_minutes == 0 {
            return Err(StarwatchError::Config(
                "poller.interval_minutes must be at least 1".into(),
            ));
        }
        if self.poller.interval_minutes > MAX_INTERVAL_MINUTES {
            return Err(StarwatchError::Config(format!(
                "poller.interval_minutes must be at most {MAX_INTERVAL_MINUTES}"
            )));
        }
        Ok(())
    }
}

/// GitHub REST API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_github_api")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_github_api() -> String { "https://api.github.com".into() }
fn default_timeout_secs() -> u64 { 15 }

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: default_github_api(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Telegram bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    #[serde(default = "default_telegram_api")]
    pub api_base: String,
    /// Per-request timeout for Bot API calls. Long polls get this on top of
    /// their own wait.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn bool_true() -> bool { true }
fn default_poll_interval() -> u64 { 1 }
fn default_telegram_api() -> String { "https://api.telegram.org".into() }

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            enabled: true,
            poll_interval: default_poll_interval(),
            api_base: default_telegram_api(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Star poller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    #[serde(default)]
    pub run_on_start: bool,
}

fn default_interval_minutes() -> u64 { 30 }
fn default_batch_size() -> usize { 10 }
fn default_batch_delay_ms() -> u64 { 1000 }

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            run_on_start: false,
        }
    }
}

/// SQLite store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String { "~/.starwatch/starwatch.db".into() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

impl StoreConfig {
    /// Store path with `~` expanded.
    pub fn expanded_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bearer token required by `/api/v1/*`. `None` leaves the API open.
    #[serde(default)]
    pub trigger_token: Option<String>,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 3000 }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
            trigger_token: None,
        }
    }
}
