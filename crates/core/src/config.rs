use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_CONFIG_FILE: &str = "arbora.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub transport: TransportConfig,
    pub server: ServerConfig,
    pub cart: CartConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: Option<SecretString>,
    pub chat_id: Option<String>,
}

impl TelegramConfig {
    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some() && self.chat_id.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct TransportConfig {
    pub mode: TransportMode,
    pub relay_url: Option<String>,
    pub mock_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct CartConfig {
    pub storage_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Which lead transport the process runs with, decided once at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Mock,
    Relay,
    Direct,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub transport_mode: Option<TransportMode>,
    pub relay_url: Option<String>,
    pub cart_storage_path: Option<PathBuf>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig { bot_token: None, chat_id: None },
            transport: TransportConfig {
                mode: TransportMode::Mock,
                relay_url: None,
                mock_delay_ms: 1_000,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8080 },
            cart: CartConfig { storage_path: PathBuf::from("decorative-trees-cart.json") },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for TransportMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "relay" => Ok(Self::Relay),
            "direct" => Ok(Self::Direct),
            other => Err(ConfigError::Validation(format!(
                "unsupported transport mode `{other}` (expected mock|relay|direct)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    /// Layered load: defaults, then the optional `arbora.toml` patch, then
    /// `ARBORA_*` environment overrides, then programmatic overrides,
    /// then validation.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(telegram) = patch.telegram {
            if let Some(bot_token_value) = telegram.bot_token {
                self.telegram.bot_token = Some(secret_value(bot_token_value));
            }
            if let Some(chat_id) = telegram.chat_id {
                self.telegram.chat_id = Some(chat_id);
            }
        }

        if let Some(transport) = patch.transport {
            if let Some(mode) = transport.mode {
                self.transport.mode = mode;
            }
            if let Some(relay_url) = transport.relay_url {
                self.transport.relay_url = Some(relay_url);
            }
            if let Some(mock_delay_ms) = transport.mock_delay_ms {
                self.transport.mock_delay_ms = mock_delay_ms;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(cart) = patch.cart {
            if let Some(storage_path) = cart.storage_path {
                self.cart.storage_path = storage_path;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // Bare TELEGRAM_* names are accepted for compatibility with the
        // hosting platforms the relay was originally deployed on.
        if let Some(value) =
            read_env("ARBORA_TELEGRAM_BOT_TOKEN").or_else(|| read_env("TELEGRAM_BOT_TOKEN"))
        {
            self.telegram.bot_token = Some(secret_value(value));
        }
        if let Some(value) =
            read_env("ARBORA_TELEGRAM_CHAT_ID").or_else(|| read_env("TELEGRAM_CHAT_ID"))
        {
            self.telegram.chat_id = Some(value);
        }

        if let Some(value) = read_env("ARBORA_TRANSPORT_MODE") {
            self.transport.mode = value.parse()?;
        }
        if let Some(value) = read_env("ARBORA_RELAY_URL") {
            self.transport.relay_url = Some(value);
        }
        if let Some(value) = read_env("ARBORA_MOCK_DELAY_MS") {
            self.transport.mock_delay_ms = parse_u64("ARBORA_MOCK_DELAY_MS", &value)?;
        }

        if let Some(value) = read_env("ARBORA_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("ARBORA_SERVER_PORT") {
            self.server.port = parse_u16("ARBORA_SERVER_PORT", &value)?;
        }

        if let Some(value) = read_env("ARBORA_CART_STORAGE_PATH") {
            self.cart.storage_path = PathBuf::from(value);
        }

        if let Some(value) = read_env("ARBORA_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("ARBORA_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(bot_token_value) = overrides.bot_token {
            self.telegram.bot_token = Some(secret_value(bot_token_value));
        }
        if let Some(chat_id) = overrides.chat_id {
            self.telegram.chat_id = Some(chat_id);
        }
        if let Some(mode) = overrides.transport_mode {
            self.transport.mode = mode;
        }
        if let Some(relay_url) = overrides.relay_url {
            self.transport.relay_url = Some(relay_url);
        }
        if let Some(storage_path) = overrides.cart_storage_path {
            self.cart.storage_path = storage_path;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.mode == TransportMode::Relay {
            match &self.transport.relay_url {
                Some(url) if !url.trim().is_empty() => {}
                _ => {
                    return Err(ConfigError::Validation(
                        "transport mode `relay` requires `transport.relay_url`".to_string(),
                    ))
                }
            }
        }
        if self.server.bind_address.trim().is_empty() {
            return Err(ConfigError::Validation(
                "server.bind_address must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    telegram: Option<TelegramPatch>,
    transport: Option<TransportPatch>,
    server: Option<ServerPatch>,
    cart: Option<CartPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
    chat_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransportPatch {
    mode: Option<TransportMode>,
    relay_url: Option<String>,
    mock_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct CartPatch {
    storage_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) if path.exists() => Some(path.to_path_buf()),
        Some(_) => None,
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            default.exists().then_some(default)
        }
    }
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}
