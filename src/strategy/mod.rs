//! Strategy generation: turning an opportunity into an ordered action plan.
//!
//! Defines the `StrategyGenerator` trait and the deterministic template
//! generator used both directly and as the fallback for richer generators.

pub mod template;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{Opportunity, Strategy};

pub use template::TemplateStrategist;

/// Abstraction over strategy generators.
///
/// Implementors may be slow (remote model calls), which is why the scanner
/// never calls them on the autonomous path.
#[async_trait]
pub trait StrategyGenerator: Send + Sync {
    /// Produce a strategy for the opportunity.
    async fn generate(&self, opportunity: &Opportunity) -> Result<Strategy>;

    /// Generator identifier for logging.
    fn name(&self) -> &str;
}
