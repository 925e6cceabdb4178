//! Smart-wallet batch builder.
//!
//! Maps each strategy step to a call on the protocol pool or DEX router that
//! executes it. Flash-loan repayment happens inside the loan callback, so
//! `repay` steps produce no action of their own.

use chrono::Utc;

use super::TransactionBuilder;
use crate::error::ExecutionError;
use crate::types::{
    short_address, ActionStep, BatchAction, BatchMetadata, Opportunity, Strategy,
    TransactionBatch,
};

/// Chain id for a supported network.
pub fn chain_id(network: &str) -> Option<u64> {
    match network {
        "ethereum" => Some(1),
        "polygon" => Some(137),
        "arbitrum" => Some(42161),
        _ => None,
    }
}

/// Builds batches for a single wallet on a single network.
#[derive(Debug, Clone)]
pub struct WalletBatchBuilder {
    wallet: String,
    network: String,
    chain_id: u64,
}

impl WalletBatchBuilder {
    pub fn new(wallet: impl Into<String>, network: &str) -> Result<Self, ExecutionError> {
        let chain_id =
            chain_id(network).ok_or_else(|| ExecutionError::UnsupportedNetwork(network.into()))?;
        Ok(Self {
            wallet: wallet.into(),
            network: network.to_string(),
            chain_id,
        })
    }

    fn action_for(step: &ActionStep) -> Option<BatchAction> {
        match step {
            ActionStep::FlashLoan {
                protocol, token, amount,
            } => Some(BatchAction {
                target: format!("{protocol}_pool"),
                action: step.name().into(),
                description: format!("Flash loan {amount} of {} from {protocol}", short_address(token)),
            }),
            ActionStep::Swap { dex, from, to } => Some(BatchAction {
                target: format!("{dex}_router"),
                action: step.name().into(),
                description: format!(
                    "Swap {} -> {} on {dex}",
                    short_address(from),
                    short_address(to)
                ),
            }),
            ActionStep::Liquidate {
                protocol, account, ..
            } => Some(BatchAction {
                target: format!("{protocol}_pool"),
                action: step.name().into(),
                description: format!("Liquidate {} on {protocol}", short_address(account)),
            }),
            ActionStep::Repay { .. } => None,
        }
    }
}

impl TransactionBuilder for WalletBatchBuilder {
    fn build(
        &self,
        opportunity: &Opportunity,
        strategy: &Strategy,
    ) -> Result<TransactionBatch, ExecutionError> {
        let actions: Vec<BatchAction> = strategy.steps.iter().filter_map(Self::action_for).collect();
        if actions.is_empty() {
            return Err(ExecutionError::EmptyBatch);
        }

        Ok(TransactionBatch {
            chain_id: self.chain_id,
            wallet: self.wallet.clone(),
            description: format!("{} execution: {}", opportunity.kind_name(), strategy.description),
            actions,
            metadata: BatchMetadata {
                opportunity_type: opportunity.kind_name().into(),
                estimated_profit_usd: opportunity.estimated_profit_usd,
                network: self.network.clone(),
                created_at: Utc::now(),
            },
        })
    }

    fn wallet(&self) -> &str {
        &self.wallet
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
