//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! section is optional and falls back to defaults. Secrets (the execution
//! wallet address) are referenced by env-var name in the config and resolved
//! at runtime via `std::env::var`.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::executor::EngineSettings;
use crate::engine::scanner::ScannerSettings;
use crate::error::ConfigError;
use crate::policy::Policy;
use crate::types::TokenPair;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub policy: PolicyConfig,
    pub scanner: ScannerConfig,
    pub execution: ExecutionConfig,
    pub sources: SourcesConfig,
    pub audit: AuditConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "ARBITER-001".into(),
        }
    }
}

/// Initial policy values. Mirrors [`Policy`].
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PolicyConfig {
    pub min_profit_usd: Decimal,
    pub max_gas_price_gwei: Decimal,
    pub scan_interval_secs: u64,
    pub networks: Vec<String>,
    pub monitored_pairs: Vec<TokenPair>,
    pub enabled_dexes: Vec<String>,
    pub autonomous_mode: bool,
    pub require_manual_approval: bool,
    pub blacklisted_addresses: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let p = Policy::default();
        Self {
            min_profit_usd: p.min_profit_usd,
            max_gas_price_gwei: p.max_gas_price_gwei,
            scan_interval_secs: p.scan_interval_secs,
            networks: p.networks,
            monitored_pairs: p.monitored_pairs,
            enabled_dexes: p.enabled_dexes,
            autonomous_mode: p.autonomous_mode,
            require_manual_approval: p.require_manual_approval,
            blacklisted_addresses: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScannerConfig {
    pub history_capacity: usize,
    pub error_backoff_secs: u64,
    pub stop_timeout_secs: u64,
    pub discovery_timeout_secs: u64,
    pub strategy_timeout_secs: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            history_capacity: 100,
            error_backoff_secs: 10,
            stop_timeout_secs: 5,
            discovery_timeout_secs: 30,
            strategy_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Env var holding the smart-wallet address. Unset means no backend.
    pub wallet_address_env: String,
    pub execution_history: usize,
    pub resolved_approvals: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            wallet_address_env: "ARBITER_WALLET_ADDRESS".into(),
            execution_history: 1000,
            resolved_approvals: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SourcesConfig {
    /// JSON fixture file for the replay source.
    pub replay_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AuditConfig {
    /// Append-only JSONL trail. Omit to log audit events only.
    pub jsonl_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
        }
    }
}

fn non_zero(field: &'static str, value: usize) -> Result<NonZeroUsize, ConfigError> {
    NonZeroUsize::new(value).ok_or_else(|| ConfigError::invalid(field, "must be at least 1"))
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.policy()?;
        self.scanner_settings()?;
        self.engine_settings()?;
        if self.scanner.stop_timeout_secs == 0 {
            return Err(ConfigError::invalid("scanner.stop_timeout_secs", "must be at least 1"));
        }
        if self.scanner.discovery_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "scanner.discovery_timeout_secs",
                "must be at least 1",
            ));
        }
        if self.scanner.strategy_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "scanner.strategy_timeout_secs",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Build the initial runtime policy.
    pub fn policy(&self) -> Result<Policy, ConfigError> {
        let c = &self.policy;
        let mut policy = Policy::default();
        policy.min_profit_usd = c.min_profit_usd;
        policy.max_gas_price_gwei = c.max_gas_price_gwei;
        policy.scan_interval_secs = c.scan_interval_secs;
        policy.networks = c.networks.clone();
        policy.monitored_pairs = c.monitored_pairs.clone();
        policy.enabled_dexes = c.enabled_dexes.clone();
        policy.autonomous_mode = c.autonomous_mode;
        policy.require_manual_approval = c.require_manual_approval;
        policy.set_blacklist(c.blacklisted_addresses.clone());
        policy.validate()?;
        Ok(policy)
    }

    pub fn scanner_settings(&self) -> Result<ScannerSettings, ConfigError> {
        let c = &self.scanner;
        Ok(ScannerSettings {
            history_capacity: non_zero("scanner.history_capacity", c.history_capacity)?,
            error_backoff: Duration::from_secs(c.error_backoff_secs),
            stop_timeout: Duration::from_secs(c.stop_timeout_secs),
            discovery_timeout: Duration::from_secs(c.discovery_timeout_secs),
            strategy_timeout: Duration::from_secs(c.strategy_timeout_secs),
        })
    }

    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        Ok(EngineSettings {
            execution_history: non_zero("execution.execution_history", self.execution.execution_history)?,
            resolved_approvals: non_zero("execution.resolved_approvals", self.execution.resolved_approvals)?,
        })
    }

    /// Wallet address from the configured env var, if set and non-empty.
    pub fn wallet_address(&self) -> Option<String> {
        Self::resolve_env(&self.execution.wallet_address_env)
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
