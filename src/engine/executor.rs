//! Execution gate.
//!
//! One `ExecutionEngine` per network. It runs the fixed-order safety checks,
//! owns the approval book, builds transaction batches and keeps an O(1)
//! running total of execution outcomes alongside a bounded history.

use parking_lot::Mutex;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::audit::{AuditEvent, AuditSink};
use crate::engine::approvals::ApprovalBook;
use crate::engine::history::RingBuffer;
use crate::engine::stats::StatsCounters;
use crate::error::{panic_message, ApprovalError, ExecutionError, SafetyViolation};
use crate::execution::TransactionBuilder;
use crate::policy::SharedPolicy;
use crate::strategy::template::template_strategy;
use crate::types::{ApprovalRecord, ApprovalStatus, ExecutionRecord, Opportunity};

/// Reason returned by [`ExecutionEngine::can_execute`] when every check passes.
pub const ALL_CHECKS_PASSED: &str = "All safety checks passed";

// ---------------------------------------------------------------------------
// Settings and outcomes
// ---------------------------------------------------------------------------

/// Retention limits for one engine.
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub execution_history: NonZeroUsize,
    pub resolved_approvals: NonZeroUsize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            execution_history: NonZeroUsize::new(1000).unwrap_or(NonZeroUsize::MIN),
            resolved_approvals: NonZeroUsize::new(1000).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

/// What happened to an opportunity handed to the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// A safety check failed; carries the reason.
    Rejected(String),
    /// Queued for manual approval; carries the approval id.
    Queued(String),
    /// Executed; carries the transaction reference.
    Executed(String),
    /// Execution was attempted and failed; carries the error text.
    Failed(String),
}

impl ExecutionOutcome {
    /// `true` when the opportunity was accepted (queued or executed).
    pub fn accepted(&self) -> bool {
        matches!(self, ExecutionOutcome::Queued(_) | ExecutionOutcome::Executed(_))
    }

    pub fn executed(&self) -> bool {
        matches!(self, ExecutionOutcome::Executed(_))
    }
}

/// Snapshot returned by [`ExecutionEngine::get_stats`].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EngineStats {
    #[serde(flatten)]
    pub counters: StatsCounters,
    pub success_rate: f64,
    pub pending_approvals: usize,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

struct EngineState {
    approvals: ApprovalBook,
    history: RingBuffer<ExecutionRecord>,
    stats: StatsCounters,
}

pub struct ExecutionEngine {
    network: String,
    policy: SharedPolicy,
    audit: Arc<dyn AuditSink>,
    builder: Option<Arc<dyn TransactionBuilder>>,
    state: Mutex<EngineState>,
}

impl ExecutionEngine {
    pub fn new(
        network: impl Into<String>,
        policy: SharedPolicy,
        audit: Arc<dyn AuditSink>,
        builder: Option<Arc<dyn TransactionBuilder>>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            network: network.into(),
            policy,
            audit,
            builder,
            state: Mutex::new(EngineState {
                approvals: ApprovalBook::new(settings.resolved_approvals),
                history: RingBuffer::new(settings.execution_history),
                stats: StatsCounters::new(),
            }),
        }
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn has_backend(&self) -> bool {
        self.builder.is_some()
    }

    /// Wallet the execution backend signs for, if one is attached.
    pub fn wallet(&self) -> Option<&str> {
        self.builder.as_deref().map(|b| b.wallet())
    }

    // -- Safety gate --------------------------------------------------------

    /// Run the safety checks in order: profit, gas (when reported),
    /// blacklist, backend. The first failure is returned.
    pub fn check(&self, opportunity: &Opportunity) -> Result<(), SafetyViolation> {
        let policy = self.policy.read();

        if !policy.is_profitable(opportunity.estimated_profit_usd) {
            return Err(SafetyViolation::ProfitBelowMinimum {
                profit: opportunity.estimated_profit_usd,
                minimum: policy.min_profit_usd,
            });
        }

        if let Some(gas_price) = opportunity.gas_price_gwei {
            if !policy.is_gas_acceptable(gas_price) {
                return Err(SafetyViolation::GasPriceAboveMaximum {
                    gas_price,
                    maximum: policy.max_gas_price_gwei,
                });
            }
        }

        if let Some(address) = opportunity
            .participants()
            .into_iter()
            .find(|a| policy.is_blacklisted(a))
        {
            return Err(SafetyViolation::Blacklisted {
                address: address.to_string(),
            });
        }

        if self.builder.is_none() {
            return Err(SafetyViolation::NoExecutionBackend {
                network: self.network.clone(),
            });
        }

        Ok(())
    }

    /// `(passed, reason)` form of [`check`](Self::check).
    pub fn can_execute(&self, opportunity: &Opportunity) -> (bool, String) {
        match self.check(opportunity) {
            Ok(()) => (true, ALL_CHECKS_PASSED.to_string()),
            Err(violation) => (false, violation.to_string()),
        }
    }

    // -- Approval workflow --------------------------------------------------

    pub fn submit_for_approval(&self, opportunity: Arc<Opportunity>) -> String {
        let id = self.state.lock().approvals.submit(opportunity);
        info!(network = %self.network, approval_id = %id, "Submitted for manual approval");
        self.audit.record(&AuditEvent::ApprovalSubmitted {
            network: self.network.clone(),
            approval_id: id.clone(),
        });
        id
    }

    /// Approve a pending record and execute it. Returns `false` for unknown or
    /// already-resolved ids, otherwise whether execution succeeded.
    pub fn approve_transaction(&self, approval_id: &str) -> bool {
        let opportunity = match self.resolve(approval_id, ApprovalStatus::Approved) {
            Ok(opportunity) => opportunity,
            Err(_) => return false,
        };
        self.execute_now(opportunity).executed()
    }

    /// Reject a pending record. No execution happens.
    pub fn reject_transaction(&self, approval_id: &str) -> bool {
        self.resolve(approval_id, ApprovalStatus::Rejected).is_ok()
    }

    fn resolve(
        &self,
        approval_id: &str,
        status: ApprovalStatus,
    ) -> Result<Arc<Opportunity>, ApprovalError> {
        let result = self.state.lock().approvals.resolve(approval_id, status);
        match &result {
            Ok(_) => {
                info!(network = %self.network, approval_id, %status, "Approval resolved");
                self.audit.record(&AuditEvent::ApprovalResolved {
                    network: self.network.clone(),
                    approval_id: approval_id.to_string(),
                    status,
                });
            }
            Err(e) => warn!(network = %self.network, error = %e, "Approval not resolved"),
        }
        result
    }

    pub fn get_pending_approvals(&self) -> Vec<ApprovalRecord> {
        self.state.lock().approvals.pending()
    }

    pub fn get_approval(&self, approval_id: &str) -> Option<ApprovalRecord> {
        self.state.lock().approvals.get(approval_id).cloned()
    }

    // -- Execution ----------------------------------------------------------

    /// Gate an opportunity and either queue it for approval or execute it.
    pub fn execute_opportunity(&self, opportunity: Arc<Opportunity>) -> ExecutionOutcome {
        if let Err(violation) = self.check(&opportunity) {
            info!(
                network = %self.network,
                check = violation.check_name(),
                reason = %violation,
                "Opportunity rejected by safety checks"
            );
            self.audit.record(&AuditEvent::SafetyCheckFailed {
                network: self.network.clone(),
                check: violation.check_name().to_string(),
                reason: violation.to_string(),
            });
            self.audit.record(&AuditEvent::OpportunityRejected {
                network: self.network.clone(),
                kind: opportunity.kind_name().to_string(),
                reason: violation.to_string(),
            });
            return ExecutionOutcome::Rejected(violation.to_string());
        }

        let manual = self.policy.read().require_manual_approval;
        if manual {
            return ExecutionOutcome::Queued(self.submit_for_approval(opportunity));
        }
        self.execute_now(opportunity)
    }

    /// Build the batch and record the result. Settlement is simulated: a
    /// submitted record is immediately settled at the estimated profit.
    fn execute_now(&self, opportunity: Arc<Opportunity>) -> ExecutionOutcome {
        let tx_reference = format!("0x{}", uuid::Uuid::new_v4().simple());

        match self.build_batch(&opportunity) {
            Ok(actions) => {
                let profit = opportunity.estimated_profit_usd;
                let mut record =
                    ExecutionRecord::submitted(tx_reference.clone(), &self.network, opportunity);
                self.audit.record(&AuditEvent::TransactionSubmitted {
                    network: self.network.clone(),
                    tx_reference: tx_reference.clone(),
                    estimated_profit_usd: profit,
                });

                if record.settle_success(profit) {
                    let mut state = self.state.lock();
                    state.stats.record_success(profit);
                    state.history.push(record);
                }

                info!(
                    network = %self.network,
                    tx = %tx_reference,
                    actions,
                    profit = %format!("${:.2}", profit),
                    "Execution succeeded"
                );
                self.audit.record(&AuditEvent::TransactionSucceeded {
                    network: self.network.clone(),
                    tx_reference: tx_reference.clone(),
                    profit_usd: profit,
                });
                ExecutionOutcome::Executed(tx_reference)
            }
            Err(e) => {
                let message = e.to_string();
                let mut record =
                    ExecutionRecord::submitted(tx_reference.clone(), &self.network, opportunity);
                if record.settle_failure(message.clone()) {
                    let mut state = self.state.lock();
                    state.stats.record_failure();
                    state.history.push(record);
                }

                warn!(network = %self.network, tx = %tx_reference, error = %message, "Execution failed");
                self.audit.record(&AuditEvent::TransactionFailed {
                    network: self.network.clone(),
                    tx_reference: Some(tx_reference),
                    error: message.clone(),
                });
                ExecutionOutcome::Failed(message)
            }
        }
    }

    /// Returns the number of actions in the built batch.
    fn build_batch(&self, opportunity: &Opportunity) -> Result<usize, ExecutionError> {
        let builder = self
            .builder
            .as_ref()
            .ok_or_else(|| ExecutionError::NoBackend(self.network.clone()))?;

        let built = panic::catch_unwind(AssertUnwindSafe(|| match &opportunity.strategy {
            Some(strategy) => builder.build(opportunity, strategy),
            None => {
                debug!(network = %self.network, "No strategy attached, using template");
                builder.build(opportunity, &template_strategy(opportunity))
            }
        }));
        let batch = match built {
            Ok(result) => result?,
            Err(panic) => {
                return Err(ExecutionError::Build(format!(
                    "builder panicked: {}",
                    panic_message(panic.as_ref())
                )));
            }
        };
        debug!(
            network = %self.network,
            chain_id = batch.chain_id,
            wallet = %batch.wallet,
            "Transaction batch built"
        );
        Ok(batch.actions.len())
    }

    // -- Queries ------------------------------------------------------------

    /// Constant-time snapshot of the counters.
    pub fn get_stats(&self) -> EngineStats {
        let state = self.state.lock();
        EngineStats {
            counters: state.stats,
            success_rate: state.stats.success_rate(),
            pending_approvals: state.approvals.pending_count(),
        }
    }

    /// Most recent execution records, newest first.
    pub fn get_execution_history(&self, limit: usize) -> Vec<ExecutionRecord> {
        self.state.lock().history.recent(limit).cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
