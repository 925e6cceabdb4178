//! Deterministic template strategies.
//!
//! Arbitrage: flash loan the base token, buy on the cheap DEX, sell on the
//! expensive one, repay. Liquidation: flash loan the debt token, liquidate,
//! swap seized collateral back to the debt token, repay.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal_macros::dec;

use super::StrategyGenerator;
use crate::types::{short_address, ActionStep, Opportunity, OpportunityKind, Strategy};

/// Flash-loan provider used by every template.
const FLASH_LOAN_PROTOCOL: &str = "aave_v3";

/// DEX used to unwind seized collateral.
const COLLATERAL_SWAP_DEX: &str = "uniswap_v3";

/// Build the template strategy for an opportunity. Pure and cheap.
pub fn template_strategy(opportunity: &Opportunity) -> Strategy {
    match &opportunity.kind {
        OpportunityKind::Arbitrage {
            pair,
            buy_dex,
            sell_dex,
            flash_loan_amount,
        } => Strategy {
            description: format!("Arbitrage {pair} between {buy_dex} and {sell_dex}"),
            steps: vec![
                ActionStep::FlashLoan {
                    protocol: FLASH_LOAN_PROTOCOL.into(),
                    token: pair.base.clone(),
                    amount: flash_loan_amount.to_string(),
                },
                ActionStep::Swap {
                    dex: buy_dex.clone(),
                    from: pair.base.clone(),
                    to: pair.quote.clone(),
                },
                ActionStep::Swap {
                    dex: sell_dex.clone(),
                    from: pair.quote.clone(),
                    to: pair.base.clone(),
                },
                ActionStep::Repay {
                    protocol: FLASH_LOAN_PROTOCOL.into(),
                },
            ],
            slippage_tolerance_pct: dec!(0.5),
            risks: vec![
                "Price slippage during execution".into(),
                "MEV/frontrunning risk".into(),
                "Gas price fluctuation".into(),
            ],
            insights: None,
            generated_at: Utc::now(),
        },
        OpportunityKind::Liquidation {
            protocol,
            account,
            collateral_token,
            debt_token,
            ..
        } => Strategy {
            description: format!(
                "Liquidate {} on {protocol}",
                short_address(account)
            ),
            steps: vec![
                ActionStep::FlashLoan {
                    protocol: FLASH_LOAN_PROTOCOL.into(),
                    token: debt_token.clone(),
                    amount: "required_debt_amount".into(),
                },
                ActionStep::Liquidate {
                    protocol: protocol.clone(),
                    account: account.clone(),
                    collateral_token: collateral_token.clone(),
                    debt_token: debt_token.clone(),
                },
                ActionStep::Swap {
                    dex: COLLATERAL_SWAP_DEX.into(),
                    from: collateral_token.clone(),
                    to: debt_token.clone(),
                },
                ActionStep::Repay {
                    protocol: FLASH_LOAN_PROTOCOL.into(),
                },
            ],
            slippage_tolerance_pct: dec!(1.0),
            risks: vec![
                "Collateral price volatility".into(),
                "Liquidation may be front-run".into(),
                "Slippage on collateral swap".into(),
            ],
            insights: None,
            generated_at: Utc::now(),
        },
    }
}

/// Generator that always returns the template. Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateStrategist;

#[async_trait]
impl StrategyGenerator for TemplateStrategist {
    async fn generate(&self, opportunity: &Opportunity) -> Result<Strategy> {
        Ok(template_strategy(opportunity))
    }

    fn name(&self) -> &str {
        "template"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
