//! Typed errors surfaced by the policy, approval and execution layers.
//!
//! Plumbing code (config loading, fixture parsing, wiring) uses `anyhow`;
//! these enums cover the failures callers are expected to match on.

use rust_decimal::Decimal;
use std::any::Any;
use thiserror::Error;

use crate::types::ApprovalStatus;

/// A failed safety check. The `Display` text is the human-readable reason
/// reported by the execution gate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SafetyViolation {
    #[error("Profit ${profit:.2} below minimum ${minimum:.2}")]
    ProfitBelowMinimum { profit: Decimal, minimum: Decimal },

    #[error("Gas price {gas_price} gwei exceeds maximum {maximum} gwei")]
    GasPriceAboveMaximum { gas_price: Decimal, maximum: Decimal },

    #[error("Address {address} is blacklisted")]
    Blacklisted { address: String },

    #[error("No execution wallet configured for {network}")]
    NoExecutionBackend { network: String },
}

impl SafetyViolation {
    /// Short machine-friendly name of the failed check.
    pub fn check_name(&self) -> &'static str {
        match self {
            SafetyViolation::ProfitBelowMinimum { .. } => "min_profit",
            SafetyViolation::GasPriceAboveMaximum { .. } => "max_gas",
            SafetyViolation::Blacklisted { .. } => "blacklist",
            SafetyViolation::NoExecutionBackend { .. } => "execution_backend",
        }
    }
}

/// Approval workflow failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApprovalError {
    #[error("Approval not found: {0}")]
    Unknown(String),

    #[error("Approval {id} already {status}")]
    AlreadyResolved { id: String, status: ApprovalStatus },
}

/// Failures while turning an opportunity into a transaction batch.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("No execution backend available on {0}")]
    NoBackend(String),

    #[error("Strategy produced no executable actions")]
    EmptyBatch,

    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error("Failed to build transaction batch: {0}")]
    Build(String),
}

/// Configuration and runtime policy update failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Best-effort text of a caught panic payload.
pub fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
