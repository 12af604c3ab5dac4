//! Configuration management for destctl
//!
//! This module defines the main `Config` struct and its sub-structs. The
//! dispatch library never loads configuration itself: the binary uses
//! `figment` to layer defaults, a TOML file, `DESTCTL_` environment variables
//! and command-line arguments, then hands the sections to the components.

use crate::cli::Cli;
use crate::core::DestinationType;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Routing settings.
    pub dispatch: DispatchConfig,
    /// Settings shared by every HTTP transport client.
    pub http: HttpConfig,
    /// Client cache policy applied to every factory.
    pub cache: ClientCacheConfig,
    /// Email relay settings.
    #[serde(default)]
    pub email: EmailConfig,
}

/// Settings for the dispatcher.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DispatchConfig {
    /// Upper bound for a publish when the message carries no timeout of its own.
    pub default_timeout_ms: u64,
    /// When set, only these destination types may be dispatched.
    #[serde(default)]
    pub allowed_types: Option<Vec<DestinationType>>,
}

impl DispatchConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 10_000,
            allowed_types: None,
        }
    }
}

/// Settings for HTTP transport clients.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct HttpConfig {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            request_timeout_ms: 10_000,
            user_agent: format!("destctl/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Order in which cached clients are evicted once the cache is full.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EvictionOrder {
    #[default]
    Lru,
    TinyLfu,
}

/// Client cache policy.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ClientCacheConfig {
    /// When false, every publish builds a fresh client.
    pub enabled: bool,
    /// Maximum number of clients kept per factory.
    pub max_capacity: u64,
    /// Forces a rebuild this long after a client was created.
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
    /// Drops a client that has not been used for this long.
    #[serde(default)]
    pub idle_seconds: Option<u64>,
    #[serde(default)]
    pub eviction: EvictionOrder,
}

impl Default for ClientCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_capacity: 256,
            ttl_seconds: Some(3600),
            idle_seconds: None,
            eviction: EvictionOrder::Lru,
        }
    }
}

/// Configuration for the email relay destination.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct EmailConfig {
    /// Credentials referenced by `EmailMessage::credential_ref`.
    #[serde(default)]
    pub credentials: HashMap<String, EmailCredential>,
}

/// Basic-auth credential for a mail relay.
#[derive(Deserialize, Serialize, Clone, PartialEq)]
pub struct EmailCredential {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for EmailCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailCredential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Config {
    /// Loads the application configuration.
    ///
    /// Sources are merged in order: built-in defaults, the TOML file named by
    /// `--config` (if any), `DESTCTL_`-prefixed environment variables (`__`
    /// separates nested keys, e.g. `DESTCTL_DISPATCH__DEFAULT_TIMEOUT_MS`),
    /// and finally command-line arguments.
    pub fn load(cli: &Cli) -> Result<Self, figment::Error> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = &cli.config {
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::prefixed("DESTCTL_").split("__"))
            .merge(cli.clone())
            .extract()
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            dispatch: DispatchConfig::default(),
            http: HttpConfig::default(),
            cache: ClientCacheConfig::default(),
            email: EmailConfig::default(),
        }
    }
}
