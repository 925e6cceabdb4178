//! Mock opportunity source for integration testing.
//!
//! Provides a deterministic `OpportunitySource` that answers from a fixed
//! table of opportunities keyed by pair, counts calls, and can be told to
//! fail, hang or panic on demand.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arbiter::sources::OpportunitySource;
use arbiter::types::{Opportunity, OpportunityKind, TokenPair};

pub const WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";
pub const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
pub const USDT: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";
pub const DAI: &str = "0x6B175474E89094C44Da98b954EedeAC495271d0F";
pub const WALLET: &str = "0x1234567890123456789012345678901234567890";

/// How the mock misbehaves, if at all.
#[derive(Debug, Clone)]
pub enum Fault {
    Error(String),
    Hang(Duration),
    Panic,
}

pub struct MockSource {
    network: String,
    table: HashMap<TokenPair, Opportunity>,
    calls: AtomicUsize,
    /// If set, every discovery call misbehaves this way.
    fault: Arc<Mutex<Option<Fault>>>,
}

impl MockSource {
    pub fn new(network: &str) -> Self {
        Self {
            network: network.to_string(),
            table: HashMap::new(),
            calls: AtomicUsize::new(0),
            fault: Arc::new(Mutex::new(None)),
        }
    }

    /// Answer `opportunity` whenever its pair is scanned.
    pub fn with(mut self, opportunity: Opportunity) -> Self {
        if let OpportunityKind::Arbitrage { pair, .. } = &opportunity.kind {
            self.table.insert(pair.clone(), opportunity);
        }
        self
    }

    pub fn set_fault(&self, fault: Fault) {
        *self.fault.lock().unwrap() = Some(fault);
    }

    pub fn clear_fault(&self) {
        *self.fault.lock().unwrap() = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OpportunitySource for MockSource {
    async fn discover(&self, pair: &TokenPair, dexes: &[String]) -> Result<Opportunity> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let fault = self.fault.lock().unwrap().clone();
        match fault {
            Some(Fault::Error(msg)) => return Err(anyhow!(msg)),
            Some(Fault::Hang(d)) => tokio::time::sleep(d).await,
            Some(Fault::Panic) => panic!("mock source exploded"),
            None => {}
        }

        Ok(self
            .table
            .get(pair)
            .cloned()
            .unwrap_or_else(|| Opportunity::unprofitable_arbitrage(pair, dexes)))
    }

    fn network(&self) -> &str {
        &self.network
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A WETH/`quote` arbitrage worth `profit` at `gas_gwei`.
pub fn arbitrage(quote: &str, profit: Decimal, gas_gwei: Decimal) -> Opportunity {
    Opportunity::new(
        OpportunityKind::Arbitrage {
            pair: TokenPair::new(WETH, quote),
            buy_dex: "sushiswap".into(),
            sell_dex: "uniswap_v3".into(),
            flash_loan_amount: dec!(10),
        },
        profit,
        true,
    )
    .with_gas(350_000, Some(gas_gwei))
}
