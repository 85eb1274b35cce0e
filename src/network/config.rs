use crate::messages::control::DEFAULT_GOODBYE_TOKENS;
use crate::messages::wire::{Framing, DEFAULT_WRITE_TIMEOUT};
use crate::network::endpoint::{Endpoint, Role};
use crate::network::error::ConnectionError;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// What happens to queued messages when a lost connection is replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueuePolicy {
    /// Clear both queues on reconnect
    #[default]
    Discard,
    /// Keep unsent and unread messages across reconnects
    Preserve,
}

/// Back-off between establish attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_RECONNECT_BASE_DELAY,
            max_delay: DEFAULT_RECONNECT_MAX_DELAY,
            multiplier: 2,
        }
    }
}

impl RetryConfig {
    /// The same delay before every attempt
    pub fn fixed(delay: Duration) -> Self {
        Self {
            base_delay: delay,
            max_delay: delay,
            multiplier: 1,
        }
    }

    /// Delay before the given attempt (1-based), capped at `max_delay`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let factor = self
            .multiplier
            .max(1)
            .saturating_pow(attempt.saturating_sub(1));
        let delay = self.base_delay.saturating_mul(factor);
        delay.min(self.max_delay)
    }
}

/// Tunables of the connection handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Longest the handler waits for readable data before re-checking state
    pub poll_interval: Duration,
    pub framing: Framing,
    pub queue_policy: QueuePolicy,
    /// Retry failures before the first successful connection instead of exiting
    pub retry_initial_connect: bool,
    pub reconnect: RetryConfig,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    pub goodbye_tokens: Vec<String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            framing: Framing::default(),
            queue_policy: QueuePolicy::default(),
            retry_initial_connect: false,
            reconnect: RetryConfig::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            goodbye_tokens: DEFAULT_GOODBYE_TOKENS
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

/// Construction parameters of a connection manager.
///
/// Fields stay optional so an incomplete setup is reported by `start()`
/// rather than at construction.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSettings {
    pub role: Option<Role>,
    pub address: Option<String>,
    pub port: Option<u16>,
    pub bind_address: Option<String>,
    pub config: ManagerConfig,
}

impl ConnectionSettings {
    pub fn initiator(address: impl Into<String>, port: u16) -> Self {
        Self {
            role: Some(Role::Initiator),
            address: Some(address.into()),
            port: Some(port),
            ..Self::default()
        }
    }

    pub fn acceptor(port: u16) -> Self {
        Self {
            role: Some(Role::Acceptor),
            port: Some(port),
            ..Self::default()
        }
    }

    pub fn with_config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_bind_address(mut self, bind_address: impl Into<String>) -> Self {
        self.bind_address = Some(bind_address.into());
        self
    }

    /// Check the parameters and build the endpoint they describe
    pub fn endpoint(&self) -> Result<Endpoint, ConnectionError> {
        let role = self
            .role
            .ok_or_else(|| ConnectionError::Configuration("role is not set".to_string()))?;
        let port = self
            .port
            .ok_or_else(|| ConnectionError::Configuration("port is not set".to_string()))?;

        match role {
            Role::Initiator => {
                let address = self
                    .address
                    .as_deref()
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .ok_or_else(|| {
                        ConnectionError::Configuration(
                            "initiator requires a server address".to_string(),
                        )
                    })?;
                Ok(Endpoint::Initiator {
                    address: address.to_string(),
                    port,
                })
            }
            Role::Acceptor => Ok(Endpoint::Acceptor {
                bind_address: self
                    .bind_address
                    .clone()
                    .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
                port,
            }),
        }
    }
}
