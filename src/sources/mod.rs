//! Opportunity sources.
//!
//! Defines the `OpportunitySource` trait the scanner queries once per
//! network and pair, plus a fixture-driven replay implementation.

pub mod replay;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{Opportunity, TokenPair};

pub use replay::ReplaySource;

/// Abstraction over per-network opportunity discovery.
///
/// "Nothing to do" is an ordinary answer: implementors return an opportunity
/// with `profitable == false` rather than an error. Errors are reserved for
/// real failures (RPC down, malformed response) and are isolated to the pair
/// being scanned.
#[async_trait]
pub trait OpportunitySource: Send + Sync {
    /// Look for an opportunity on `pair` across the given DEXes.
    async fn discover(&self, pair: &TokenPair, dexes: &[String]) -> Result<Opportunity>;

    /// Network this source reads from.
    fn network(&self) -> &str;

    /// Source name for logging.
    fn name(&self) -> &str;
}
