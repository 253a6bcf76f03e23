//! Configuration loading from TOML with environment variable overrides.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Deployment-specific values (`DATABASE_URL`, `PORT`, `COMMAND_CHANNEL_ID`)
//! can be overridden from the environment after `.env` is loaded.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::engine::EngineConfig;
use crate::types::DEFAULT_STARTING_BALANCE;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LedgerConfig {
    pub starting_balance: i64,
    pub max_attempts: u32,
    pub bet_timeout_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_balance: DEFAULT_STARTING_BALANCE,
            max_attempts: 5,
            bet_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// `sqlite://path.db`, `sqlite::memory:`, or `memory`.
    pub database_url: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://ledger.db".to_string(),
            max_connections: 5,
            busy_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CommandsConfig {
    pub prefix: String,
    /// When set, prefixed commands are only answered in this channel.
    pub channel_id: Option<String>,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            prefix: "!g".to_string(),
            channel_id: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    /// Environment overrides are applied either way.
    pub fn load_or_default(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.storage.database_url = url;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("PORT is not a valid port: {port}"))?;
        }
        if let Some(channel) = lookup("COMMAND_CHANNEL_ID") {
            self.commands.channel_id = Some(channel).filter(|c| !c.is_empty());
        }
        Ok(())
    }

    /// Reject values the ledger cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.ledger.starting_balance < 0 {
            anyhow::bail!(
                "ledger.starting_balance must be >= 0, got {}",
                self.ledger.starting_balance
            );
        }
        if self.ledger.max_attempts == 0 {
            anyhow::bail!("ledger.max_attempts must be at least 1");
        }
        if self.commands.prefix.trim().is_empty() {
            anyhow::bail!("commands.prefix must not be empty");
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_attempts: self.ledger.max_attempts,
            bet_timeout: Duration::from_millis(self.ledger.bet_timeout_ms),
        }
    }
}
