//! Shared types for the ARBITER agent.
//!
//! These types form the data model used across all modules: candidate
//! opportunities and their strategies, approval and execution records, and
//! the abstract transaction batch handed to an execution backend.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Token pair
// ---------------------------------------------------------------------------

/// An ordered pair of token addresses monitored for arbitrage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenPair {
    pub base: String,
    pub quote: String,
}

impl TokenPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// Both addresses, base first.
    pub fn addresses(&self) -> [&str; 2] {
        [&self.base, &self.quote]
    }
}

impl fmt::Display for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", short_address(&self.base), short_address(&self.quote))
    }
}

/// Abbreviate a hex address for log output (`0xC02aaA39…`).
pub fn short_address(address: &str) -> &str {
    address.get(..10).unwrap_or(address)
}

// ---------------------------------------------------------------------------
// Opportunity
// ---------------------------------------------------------------------------

/// What kind of trade an opportunity describes, with the fields specific to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpportunityKind {
    /// Buy on one DEX and sell on another, funded by a flash loan.
    Arbitrage {
        pair: TokenPair,
        buy_dex: String,
        sell_dex: String,
        /// Flash loan size, denominated in the base token.
        flash_loan_amount: Decimal,
    },
    /// Repay part of an undercollateralised position in exchange for collateral.
    Liquidation {
        protocol: String,
        account: String,
        collateral_token: String,
        debt_token: String,
        health_factor: Decimal,
    },
}

impl OpportunityKind {
    pub fn name(&self) -> &'static str {
        match self {
            OpportunityKind::Arbitrage { .. } => "arbitrage",
            OpportunityKind::Liquidation { .. } => "liquidation",
        }
    }
}

/// A candidate trade discovered on one network.
///
/// Once an opportunity leaves its source the only changes it receives are an
/// attached [`Strategy`] and the network/discovery tag. After tagging it is
/// shared as `Arc<Opportunity>` and never mutated again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    #[serde(flatten)]
    pub kind: OpportunityKind,
    /// Net of estimated gas cost.
    pub estimated_profit_usd: Decimal,
    /// Estimated gas units for the full strategy.
    #[serde(default)]
    pub gas_estimate: u64,
    /// Gas price observed at discovery time, when the source reports one.
    #[serde(default)]
    pub gas_price_gwei: Option<Decimal>,
    pub profitable: bool,
    #[serde(default)]
    pub strategy: Option<Strategy>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub discovered_at: Option<DateTime<Utc>>,
}

impl Opportunity {
    pub fn new(kind: OpportunityKind, estimated_profit_usd: Decimal, profitable: bool) -> Self {
        Self {
            kind,
            estimated_profit_usd,
            gas_estimate: 0,
            gas_price_gwei: None,
            profitable,
            strategy: None,
            network: None,
            discovered_at: None,
        }
    }

    /// An arbitrage candidate with no exploitable spread.
    pub fn unprofitable_arbitrage(pair: &TokenPair, dexes: &[String]) -> Self {
        let buy_dex = dexes.first().cloned().unwrap_or_default();
        let sell_dex = dexes.get(1).cloned().unwrap_or_else(|| buy_dex.clone());
        Self::new(
            OpportunityKind::Arbitrage {
                pair: pair.clone(),
                buy_dex,
                sell_dex,
                flash_loan_amount: Decimal::ZERO,
            },
            Decimal::ZERO,
            false,
        )
    }

    pub fn with_gas(mut self, gas_estimate: u64, gas_price_gwei: Option<Decimal>) -> Self {
        self.gas_estimate = gas_estimate;
        self.gas_price_gwei = gas_price_gwei;
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Stamp the network and discovery time. Called once by the scanner.
    pub fn tagged(mut self, network: &str, discovered_at: DateTime<Utc>) -> Self {
        self.network = Some(network.to_string());
        self.discovered_at = Some(discovered_at);
        self
    }

    /// Every address the opportunity touches; all are screened by the blacklist.
    pub fn participants(&self) -> Vec<&str> {
        match &self.kind {
            OpportunityKind::Arbitrage { pair, .. } => pair.addresses().to_vec(),
            OpportunityKind::Liquidation {
                account,
                collateral_token,
                debt_token,
                ..
            } => vec![account, collateral_token, debt_token],
        }
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }
}

impl fmt::Display for Opportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            OpportunityKind::Arbitrage {
                pair,
                buy_dex,
                sell_dex,
                ..
            } => write!(
                f,
                "arbitrage {pair} {buy_dex}->{sell_dex} est. ${:.2}",
                self.estimated_profit_usd
            ),
            OpportunityKind::Liquidation {
                protocol,
                account,
                health_factor,
                ..
            } => write!(
                f,
                "liquidation {} on {protocol} (hf={health_factor:.4}) est. ${:.2}",
                short_address(account),
                self.estimated_profit_usd
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// One abstract step of an execution strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionStep {
    FlashLoan {
        protocol: String,
        token: String,
        /// Either a decimal amount or a symbolic amount resolved on-chain.
        amount: String,
    },
    Swap {
        dex: String,
        from: String,
        to: String,
    },
    Liquidate {
        protocol: String,
        account: String,
        collateral_token: String,
        debt_token: String,
    },
    Repay {
        protocol: String,
    },
}

impl ActionStep {
    pub fn name(&self) -> &'static str {
        match self {
            ActionStep::FlashLoan { .. } => "flash_loan",
            ActionStep::Swap { .. } => "swap",
            ActionStep::Liquidate { .. } => "liquidate",
            ActionStep::Repay { .. } => "repay",
        }
    }
}

/// Ordered execution plan attached to an opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub description: String,
    pub steps: Vec<ActionStep>,
    pub slippage_tolerance_pct: Decimal,
    #[serde(default)]
    pub risks: Vec<String>,
    /// Free-form commentary from a richer generator, if one was used.
    #[serde(default)]
    pub insights: Option<String>,
    pub generated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Approval workflow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalStatus::Pending => write!(f, "pending"),
            ApprovalStatus::Approved => write!(f, "approved"),
            ApprovalStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// An opportunity waiting for (or having received) a manual decision.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalRecord {
    pub id: String,
    /// Submission order; doubles as the key of the pending index.
    #[serde(skip)]
    pub seq: u64,
    pub opportunity: Arc<Opportunity>,
    pub submitted_at: DateTime<Utc>,
    pub status: ApprovalStatus,
    pub resolved_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Execution records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Submitted,
    Success,
    Failed,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Submitted => write!(f, "submitted"),
            ExecutionStatus::Success => write!(f, "success"),
            ExecutionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One execution attempt. Moves `submitted -> success | failed` exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub tx_reference: String,
    pub network: String,
    pub opportunity: Arc<Opportunity>,
    pub executed_at: DateTime<Utc>,
    pub status: ExecutionStatus,
    pub actual_profit_usd: Option<Decimal>,
    pub error: Option<String>,
}

impl ExecutionRecord {
    pub fn submitted(tx_reference: String, network: &str, opportunity: Arc<Opportunity>) -> Self {
        Self {
            tx_reference,
            network: network.to_string(),
            opportunity,
            executed_at: Utc::now(),
            status: ExecutionStatus::Submitted,
            actual_profit_usd: None,
            error: None,
        }
    }

    /// Settle as successful. Returns `false` if the record was already terminal.
    pub fn settle_success(&mut self, actual_profit_usd: Decimal) -> bool {
        if self.status != ExecutionStatus::Submitted {
            return false;
        }
        self.status = ExecutionStatus::Success;
        self.actual_profit_usd = Some(actual_profit_usd);
        true
    }

    /// Settle as failed. Returns `false` if the record was already terminal.
    pub fn settle_failure(&mut self, error: impl Into<String>) -> bool {
        if self.status != ExecutionStatus::Submitted {
            return false;
        }
        self.status = ExecutionStatus::Failed;
        self.error = Some(error.into());
        true
    }
}

// ---------------------------------------------------------------------------
// Transaction batch
// ---------------------------------------------------------------------------

/// One call inside a batch, addressed to a protocol contract or DEX router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchAction {
    /// Protocol or router the call is sent to (e.g. `aave_v3_pool`).
    pub target: String,
    pub action: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchMetadata {
    pub opportunity_type: String,
    pub estimated_profit_usd: Decimal,
    pub network: String,
    pub created_at: DateTime<Utc>,
}

/// Opaque, unsigned batch produced by a transaction builder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionBatch {
    pub chain_id: u64,
    pub wallet: String,
    pub description: String,
    pub actions: Vec<BatchAction>,
    pub metadata: BatchMetadata,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";
    const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";

    fn liquidation() -> Opportunity {
        Opportunity::new(
            OpportunityKind::Liquidation {
                protocol: "aave_v3".into(),
                account: "0x1111111111111111111111111111111111111111".into(),
                collateral_token: WETH.into(),
                debt_token: USDC.into(),
                health_factor: dec!(0.93),
            },
            dec!(120),
            true,
        )
    }

    #[test]
    fn test_arbitrage_participants_are_pair() {
        let pair = TokenPair::new(WETH, USDC);
        let opp = Opportunity::unprofitable_arbitrage(&pair, &["uniswap_v3".into()]);
        assert_eq!(opp.participants(), vec![WETH, USDC]);
        assert!(!opp.profitable);
        assert_eq!(opp.kind_name(), "arbitrage");
    }

    #[test]
    fn test_liquidation_participants_include_account() {
        let opp = liquidation();
        let p = opp.participants();
        assert_eq!(p.len(), 3);
        assert!(p.contains(&"0x1111111111111111111111111111111111111111"));
    }

    #[test]
    fn test_tagging_sets_network_once() {
        let now = Utc::now();
        let opp = liquidation().tagged("polygon", now);
        assert_eq!(opp.network.as_deref(), Some("polygon"));
        assert_eq!(opp.discovered_at, Some(now));
    }

    #[test]
    fn test_opportunity_json_shape() {
        let json = serde_json::to_value(liquidation()).unwrap();
        assert_eq!(json["type"], "liquidation");
        assert_eq!(json["protocol"], "aave_v3");
    }

    #[test]
    fn test_opportunity_deserialises_with_defaults() {
        let json = format!(
            r#"{{"type":"arbitrage","pair":{{"base":"{WETH}","quote":"{USDC}"}},
                "buy_dex":"sushiswap","sell_dex":"uniswap_v3","flash_loan_amount":10.0,
                "estimated_profit_usd":75.5,"profitable":true}}"#
        );
        let opp: Opportunity = serde_json::from_str(&json).unwrap();
        assert!(opp.profitable);
        assert_eq!(opp.gas_estimate, 0);
        assert!(opp.strategy.is_none());
    }

    #[test]
    fn test_action_step_tags() {
        let step = ActionStep::Repay {
            protocol: "aave_v3".into(),
        };
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["action"], "repay");
        assert_eq!(step.name(), "repay");
    }

    #[test]
    fn test_execution_record_settles_once() {
        let mut rec = ExecutionRecord::submitted("0xabc".into(), "ethereum", Arc::new(liquidation()));
        assert!(rec.settle_success(dec!(120)));
        assert!(!rec.settle_failure("late failure"));
        assert_eq!(rec.status, ExecutionStatus::Success);
        assert_eq!(rec.actual_profit_usd, Some(dec!(120)));
        assert!(rec.error.is_none());
    }

    #[test]
    fn test_short_address() {
        assert_eq!(short_address(WETH), "0xC02aaA39");
        assert_eq!(short_address("0x12"), "0x12");
    }
}
