use crate::messages::{Framing, DEFAULT_MAX_MESSAGE_SIZE};
use crate::network::config::{
    ConnectionSettings, ManagerConfig, QueuePolicy, RetryConfig, DEFAULT_POLL_INTERVAL,
    DEFAULT_RECONNECT_BASE_DELAY, DEFAULT_RECONNECT_MAX_DELAY,
};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_ADDRESS: &str = "localhost";
pub const DEFAULT_PORT: u16 = 50000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write configuration file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Wire framing as spelled in the configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FramingKind {
    #[default]
    LengthPrefixed,
    Raw,
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server the client connects to when no address is given
    pub default_address: String,
    /// Port used by both programs when none is given
    pub default_port: u16,
    pub poll_interval_ms: u64,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    pub framing: FramingKind,
    /// Largest length-prefixed message accepted or sent
    pub max_message_size: usize,
    pub preserve_queues_on_reconnect: bool,
    /// Keep retrying when the very first connection fails
    pub retry_initial_connect: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_address: DEFAULT_ADDRESS.to_string(),
            default_port: DEFAULT_PORT,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            reconnect_base_delay_ms: DEFAULT_RECONNECT_BASE_DELAY.as_millis() as u64,
            reconnect_max_delay_ms: DEFAULT_RECONNECT_MAX_DELAY.as_millis() as u64,
            framing: FramingKind::default(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            preserve_queues_on_reconnect: false,
            retry_initial_connect: false,
        }
    }
}

impl Config {
    /// Get the default config directory
    pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
        ProjectDirs::from("dev", "lanchat", "lanchat")
            .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Get the default config file path
    pub fn default_config_file() -> Result<PathBuf, ConfigError> {
        Ok(Self::default_config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub fn load_or_create_default() -> Result<Self, ConfigError> {
        Self::load_or_create(&Self::default_config_file()?)
    }

    /// Load `path`, writing the defaults there first if it is missing
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load_from(path)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            info!("Created default configuration at {}", path.display());
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        // Ensure config directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(write_error)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_address.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "default_address must not be empty".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.max_message_size == 0 || self.max_message_size > u32::MAX as usize {
            return Err(ConfigError::Invalid(format!(
                "max_message_size must be between 1 and {}",
                u32::MAX
            )));
        }
        if self.reconnect_max_delay_ms < self.reconnect_base_delay_ms {
            return Err(ConfigError::Invalid(
                "reconnect_max_delay_ms is smaller than reconnect_base_delay_ms".to_string(),
            ));
        }
        Ok(())
    }

    /// Handler tunables described by this file
    pub fn manager_config(&self) -> ManagerConfig {
        let framing = match self.framing {
            FramingKind::LengthPrefixed => Framing::LengthPrefixed {
                max_message_size: self.max_message_size,
            },
            FramingKind::Raw => Framing::legacy(),
        };
        let queue_policy = if self.preserve_queues_on_reconnect {
            QueuePolicy::Preserve
        } else {
            QueuePolicy::Discard
        };

        ManagerConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            framing,
            queue_policy,
            retry_initial_connect: self.retry_initial_connect,
            reconnect: RetryConfig {
                base_delay: Duration::from_millis(self.reconnect_base_delay_ms),
                max_delay: Duration::from_millis(self.reconnect_max_delay_ms),
                ..RetryConfig::default()
            },
            ..ManagerConfig::default()
        }
    }

    /// Settings for the chat client; explicit values win over the file
    pub fn client_settings(&self, address: Option<String>, port: Option<u16>) -> ConnectionSettings {
        ConnectionSettings::initiator(
            address.unwrap_or_else(|| self.default_address.clone()),
            port.unwrap_or(self.default_port),
        )
        .with_config(self.manager_config())
    }

    /// Settings for the acknowledging server
    pub fn server_settings(&self, port: Option<u16>) -> ConnectionSettings {
        ConnectionSettings::acceptor(port.unwrap_or(self.default_port))
            .with_config(self.manager_config())
    }
}
