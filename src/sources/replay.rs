//! Replay source: answers discovery calls from recorded opportunities.
//!
//! Fixture files are JSON objects keyed by network, each holding a list of
//! opportunities. Fixtures are matched to a pair by token addresses
//! (case-insensitive, either order). Repeated calls for the same pair cycle
//! through its fixtures; a pair with none yields a non-profitable arbitrage.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

use super::OpportunitySource;
use crate::types::{Opportunity, OpportunityKind, TokenPair};

struct Fixtures {
    items: Vec<Opportunity>,
    cursor: AtomicUsize,
}

pub struct ReplaySource {
    network: String,
    by_pair: HashMap<(String, String), Fixtures>,
}

/// Order-independent, lowercased key for a token pair.
fn pair_key(a: &str, b: &str) -> (String, String) {
    let (a, b) = (a.to_lowercase(), b.to_lowercase());
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn fixture_key(opportunity: &Opportunity) -> (String, String) {
    match &opportunity.kind {
        OpportunityKind::Arbitrage { pair, .. } => pair_key(&pair.base, &pair.quote),
        OpportunityKind::Liquidation {
            collateral_token,
            debt_token,
            ..
        } => pair_key(collateral_token, debt_token),
    }
}

impl ReplaySource {
    pub fn new(network: impl Into<String>, opportunities: Vec<Opportunity>) -> Self {
        let mut by_pair: HashMap<(String, String), Fixtures> = HashMap::new();
        for opportunity in opportunities {
            by_pair
                .entry(fixture_key(&opportunity))
                .or_insert_with(|| Fixtures {
                    items: Vec::new(),
                    cursor: AtomicUsize::new(0),
                })
                .items
                .push(opportunity);
        }
        Self {
            network: network.into(),
            by_pair,
        }
    }

    /// Parse a fixture document into one source per network.
    pub fn from_json(json: &str) -> Result<HashMap<String, ReplaySource>> {
        let doc: HashMap<String, Vec<Opportunity>> =
            serde_json::from_str(json).context("Failed to parse replay fixtures")?;
        Ok(doc
            .into_iter()
            .map(|(network, items)| {
                let source = ReplaySource::new(network.clone(), items);
                (network, source)
            })
            .collect())
    }

    /// Load a fixture file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<HashMap<String, ReplaySource>> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay fixtures {}", path.display()))?;
        let sources = Self::from_json(&json)?;
        info!(
            path = %path.display(),
            networks = sources.len(),
            "Replay fixtures loaded"
        );
        Ok(sources)
    }

    /// Number of recorded opportunities.
    pub fn len(&self) -> usize {
        self.by_pair.values().map(|f| f.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_pair.is_empty()
    }
}

#[async_trait]
impl OpportunitySource for ReplaySource {
    async fn discover(&self, pair: &TokenPair, dexes: &[String]) -> Result<Opportunity> {
        let Some(fixtures) = self.by_pair.get(&pair_key(&pair.base, &pair.quote)) else {
            debug!(network = %self.network, pair = %pair, "No fixture for pair");
            return Ok(Opportunity::unprofitable_arbitrage(pair, dexes));
        };
        let idx = fixtures.cursor.fetch_add(1, Ordering::Relaxed) % fixtures.items.len();
        Ok(fixtures.items[idx].clone())
    }

    fn network(&self) -> &str {
        &self.network
    }

    fn name(&self) -> &str {
        "replay"
    }
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

    const FIXTURES: &str = r#"{
        "ethereum": [
            {
                "type": "arbitrage",
                "pair": {"base": "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
                         "quote": "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"},
                "buy_dex": "sushiswap",
                "sell_dex": "uniswap_v3",
                "flash_loan_amount": 10,
                "estimated_profit_usd": 120,
                "gas_estimate": 350000,
                "gas_price_gwei": 30,
                "profitable": true
            },
            {
                "type": "arbitrage",
                "pair": {"base": "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2",
                         "quote": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"},
                "buy_dex": "uniswap_v3",
                "sell_dex": "sushiswap",
                "flash_loan_amount": 5,
                "estimated_profit_usd": 12,
                "profitable": false
            }
        ],
        "polygon": []
    }"#;

    fn dexes() -> Vec<String> {
        vec!["uniswap_v3".into(), "sushiswap".into()]
    }

    #[tokio::test]
    async fn test_cycles_through_fixtures() {
        let sources = ReplaySource::from_json(FIXTURES).unwrap();
        let eth = &sources["ethereum"];
        assert_eq!(eth.len(), 2);
        assert_eq!(eth.network(), "ethereum");

        let pair = TokenPair::new(WETH, USDC);
        let first = eth.discover(&pair, &dexes()).await.unwrap();
        let second = eth.discover(&pair, &dexes()).await.unwrap();
        let third = eth.discover(&pair, &dexes()).await.unwrap();
        assert_eq!(first.estimated_profit_usd, dec!(120));
        assert_eq!(first.gas_price_gwei, Some(dec!(30)));
        assert!(!second.profitable);
        assert_eq!(third, first);
    }

    #[tokio::test]
    async fn test_pair_match_ignores_order_and_case() {
        let sources = ReplaySource::from_json(FIXTURES).unwrap();
        let reversed = TokenPair::new(USDC.to_lowercase(), WETH.to_uppercase());
        let opp = sources["ethereum"].discover(&reversed, &dexes()).await.unwrap();
        assert!(opp.profitable);
    }

    #[tokio::test]
    async fn test_unknown_pair_is_unprofitable() {
        let sources = ReplaySource::from_json(FIXTURES).unwrap();
        let polygon = &sources["polygon"];
        assert!(polygon.is_empty());
        let opp = polygon
            .discover(&TokenPair::new(WETH, "0xdead"), &dexes())
            .await
            .unwrap();
        assert!(!opp.profitable);
        assert_eq!(opp.estimated_profit_usd, dec!(0));
    }

    #[test]
    fn test_bundled_fixtures_parse() {
        let sources =
            ReplaySource::from_json(include_str!("../../fixtures/opportunities.json")).unwrap();
        for network in ["ethereum", "polygon", "arbitrum"] {
            let source = &sources[network];
            assert_eq!(source.network(), network);
            assert!(!source.is_empty());
        }
    }

    #[test]
    fn test_malformed_fixtures() {
        assert!(ReplaySource::from_json("{\"ethereum\": [{\"type\": \"bogus\"}]}").is_err());
    }
}
