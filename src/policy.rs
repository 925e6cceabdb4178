//! Safety policy: thresholds, blacklist and scan settings.
//!
//! A single `Policy` is shared between the scanner and every per-network
//! execution engine through [`SharedPolicy`], so runtime updates apply to the
//! whole pipeline at once.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::types::TokenPair;

pub type SharedPolicy = Arc<RwLock<Policy>>;

/// Mutable snapshot of the safety thresholds and scan settings.
#[derive(Debug, Clone)]
pub struct Policy {
    pub min_profit_usd: Decimal,
    pub max_gas_price_gwei: Decimal,
    pub scan_interval_secs: u64,
    pub networks: Vec<String>,
    pub monitored_pairs: Vec<TokenPair>,
    pub enabled_dexes: Vec<String>,
    pub autonomous_mode: bool,
    pub require_manual_approval: bool,
    blacklisted_addresses: Vec<String>,
    /// Lowercased mirror of `blacklisted_addresses`; rebuilt on every assignment.
    blacklist: HashSet<String>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            min_profit_usd: dec!(50),
            max_gas_price_gwei: dec!(100),
            scan_interval_secs: 60,
            networks: vec!["ethereum".into(), "polygon".into(), "arbitrum".into()],
            monitored_pairs: default_pairs(),
            enabled_dexes: vec!["uniswap_v3".into(), "sushiswap".into()],
            autonomous_mode: false,
            require_manual_approval: true,
            blacklisted_addresses: Vec::new(),
            blacklist: HashSet::new(),
        }
    }
}

/// WETH paired against the main mainnet stablecoins.
fn default_pairs() -> Vec<TokenPair> {
    const WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";
    vec![
        TokenPair::new(WETH, "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
        TokenPair::new(WETH, "0xdAC17F958D2ee523a2206206994597C13D831ec7"),
        TokenPair::new(WETH, "0x6B175474E89094C44Da98b954EedeAC495271d0F"),
    ]
}

impl Policy {
    pub fn into_shared(self) -> SharedPolicy {
        Arc::new(RwLock::new(self))
    }

    pub fn blacklisted_addresses(&self) -> &[String] {
        &self.blacklisted_addresses
    }

    /// Replace the blacklist. Membership reflects only the new list.
    pub fn set_blacklist(&mut self, addresses: Vec<String>) {
        self.blacklist = addresses.iter().map(|a| a.to_lowercase()).collect();
        self.blacklisted_addresses = addresses;
    }

    /// Case-insensitive blacklist membership.
    pub fn is_blacklisted(&self, address: &str) -> bool {
        self.blacklist.contains(&address.to_lowercase())
    }

    pub fn is_profitable(&self, profit_usd: Decimal) -> bool {
        profit_usd >= self.min_profit_usd
    }

    pub fn is_gas_acceptable(&self, gas_price_gwei: Decimal) -> bool {
        gas_price_gwei <= self.max_gas_price_gwei
    }

    /// Whether either side of the pair is blacklisted.
    pub fn pair_blacklisted(&self, pair: &TokenPair) -> bool {
        pair.addresses().iter().any(|a| self.is_blacklisted(a))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_profit_usd < Decimal::ZERO {
            return Err(ConfigError::invalid("min_profit_usd", "must not be negative"));
        }
        if self.max_gas_price_gwei <= Decimal::ZERO {
            return Err(ConfigError::invalid("max_gas_price_gwei", "must be positive"));
        }
        if self.scan_interval_secs == 0 {
            return Err(ConfigError::invalid("scan_interval_secs", "must be at least 1"));
        }
        if self.networks.iter().any(|n| n.trim().is_empty()) {
            return Err(ConfigError::invalid("networks", "network names must not be empty"));
        }
        Ok(())
    }

    /// Apply a partial update. The update is validated against a copy and
    /// only committed when the whole result is valid.
    pub fn apply(&mut self, update: &PolicyUpdate) -> Result<(), ConfigError> {
        let mut next = self.clone();
        if let Some(v) = update.min_profit_usd {
            next.min_profit_usd = v;
        }
        if let Some(v) = update.max_gas_price_gwei {
            next.max_gas_price_gwei = v;
        }
        if let Some(v) = update.scan_interval_secs {
            next.scan_interval_secs = v;
        }
        if let Some(v) = &update.networks {
            next.networks = v.clone();
        }
        if let Some(v) = &update.monitored_pairs {
            next.monitored_pairs = v.clone();
        }
        if let Some(v) = &update.enabled_dexes {
            next.enabled_dexes = v.clone();
        }
        if let Some(v) = update.autonomous_mode {
            next.autonomous_mode = v;
        }
        if let Some(v) = update.require_manual_approval {
            next.require_manual_approval = v;
        }
        if let Some(v) = &update.blacklisted_addresses {
            next.set_blacklist(v.clone());
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    pub fn snapshot(&self) -> PolicySnapshot {
        PolicySnapshot {
            min_profit_usd: self.min_profit_usd,
            max_gas_price_gwei: self.max_gas_price_gwei,
            scan_interval_secs: self.scan_interval_secs,
            autonomous_mode: self.autonomous_mode,
            require_manual_approval: self.require_manual_approval,
            blacklisted_addresses: self.blacklisted_addresses.len(),
        }
    }
}

/// Runtime override set. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyUpdate {
    pub min_profit_usd: Option<Decimal>,
    pub max_gas_price_gwei: Option<Decimal>,
    pub scan_interval_secs: Option<u64>,
    pub networks: Option<Vec<String>>,
    pub monitored_pairs: Option<Vec<TokenPair>>,
    pub enabled_dexes: Option<Vec<String>>,
    pub autonomous_mode: Option<bool>,
    pub require_manual_approval: Option<bool>,
    pub blacklisted_addresses: Option<Vec<String>>,
}

impl PolicyUpdate {
    /// Names of the fields this update touches, for audit output.
    pub fn fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.min_profit_usd.is_some() {
            fields.push("min_profit_usd");
        }
        if self.max_gas_price_gwei.is_some() {
            fields.push("max_gas_price_gwei");
        }
        if self.scan_interval_secs.is_some() {
            fields.push("scan_interval_secs");
        }
        if self.networks.is_some() {
            fields.push("networks");
        }
        if self.monitored_pairs.is_some() {
            fields.push("monitored_pairs");
        }
        if self.enabled_dexes.is_some() {
            fields.push("enabled_dexes");
        }
        if self.autonomous_mode.is_some() {
            fields.push("autonomous_mode");
        }
        if self.require_manual_approval.is_some() {
            fields.push("require_manual_approval");
        }
        if self.blacklisted_addresses.is_some() {
            fields.push("blacklisted_addresses");
        }
        fields
    }
}

/// Serialisable view of the thresholds, reported by scanner status.
#[derive(Debug, Clone, Serialize)]
pub struct PolicySnapshot {
    pub min_profit_usd: Decimal,
    pub max_gas_price_gwei: Decimal,
    pub scan_interval_secs: u64,
    pub autonomous_mode: bool,
    pub require_manual_approval: bool,
    pub blacklisted_addresses: usize,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
