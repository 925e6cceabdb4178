//! Execution backends.
//!
//! A `TransactionBuilder` turns a strategy into an opaque, unsigned batch for
//! a smart-contract wallet. Signing and submission happen elsewhere; the
//! engine only needs to know whether a batch could be built.

pub mod batch;

use crate::error::ExecutionError;
use crate::types::{Opportunity, Strategy, TransactionBatch};

pub use batch::{chain_id, WalletBatchBuilder};

#[cfg_attr(test, mockall::automock)]
pub trait TransactionBuilder: Send + Sync {
    /// Build a batch for `strategy`, attaching metadata from `opportunity`.
    fn build(
        &self,
        opportunity: &Opportunity,
        strategy: &Strategy,
    ) -> Result<TransactionBatch, ExecutionError>;

    /// Wallet the batch is addressed to.
    fn wallet(&self) -> &str;
}
