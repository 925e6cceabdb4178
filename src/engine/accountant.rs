//! Scanner bookkeeping.
//!
//! `ScanStats` holds the lifetime counters shown in scanner status;
//! `CycleReport` tallies a single iteration. Both are fed the same
//! [`ScanEvent`]s as they happen, so neither is ever rebuilt from history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::engine::executor::ExecutionOutcome;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Something that happened during a scan iteration.
#[derive(Debug, Clone, Copy)]
pub enum ScanEvent<'a> {
    /// A network's pairs are about to be scanned.
    NetworkScanned,
    /// A discovery call returned.
    PairScanned,
    /// A pair was skipped because it touches a blacklisted address.
    PairSkipped,
    /// A profitable opportunity was found.
    Found,
    /// The execution gate handled a found opportunity.
    Outcome {
        outcome: &'a ExecutionOutcome,
        profit_usd: Decimal,
    },
    /// A network, pair or loop-level failure.
    Error,
}

// ---------------------------------------------------------------------------
// Lifetime counters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    pub total_scans: u64,
    pub completed_scans: u64,
    pub opportunities_found: u64,
    pub opportunities_executed: u64,
    pub opportunities_queued: u64,
    pub total_profit_usd: Decimal,
    pub errors: u64,
    pub last_scan: Option<DateTime<Utc>>,
}

impl ScanStats {
    /// Count a new iteration and return its number.
    pub fn begin_scan(&mut self) -> u64 {
        self.total_scans += 1;
        self.total_scans
    }

    pub fn finish_scan(&mut self, at: DateTime<Utc>) {
        self.completed_scans += 1;
        self.last_scan = Some(at);
    }

    pub fn apply(&mut self, event: &ScanEvent<'_>) {
        match event {
            ScanEvent::Found => self.opportunities_found += 1,
            ScanEvent::Outcome {
                outcome,
                profit_usd,
            } => match outcome {
                ExecutionOutcome::Executed(_) => {
                    self.opportunities_executed += 1;
                    self.total_profit_usd += *profit_usd;
                }
                ExecutionOutcome::Queued(_) => self.opportunities_queued += 1,
                ExecutionOutcome::Rejected(_) | ExecutionOutcome::Failed(_) => {}
            },
            ScanEvent::Error => self.errors += 1,
            ScanEvent::NetworkScanned | ScanEvent::PairScanned | ScanEvent::PairSkipped => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Cycle report
// ---------------------------------------------------------------------------

/// Summary of one scan iteration.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub scan_number: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub networks_scanned: usize,
    pub pairs_scanned: usize,
    pub pairs_skipped: usize,
    pub opportunities_found: usize,
    pub executed: usize,
    pub queued: usize,
    pub rejected: usize,
    pub failed: usize,
    pub errors: usize,
    pub profit_usd: Decimal,
    /// Set when the iteration stopped early on cancellation.
    pub cancelled: bool,
}

impl CycleReport {
    pub fn new(scan_number: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            scan_number,
            started_at,
            finished_at: None,
            networks_scanned: 0,
            pairs_scanned: 0,
            pairs_skipped: 0,
            opportunities_found: 0,
            executed: 0,
            queued: 0,
            rejected: 0,
            failed: 0,
            errors: 0,
            profit_usd: Decimal::ZERO,
            cancelled: false,
        }
    }

    pub fn apply(&mut self, event: &ScanEvent<'_>) {
        match event {
            ScanEvent::NetworkScanned => self.networks_scanned += 1,
            ScanEvent::PairScanned => self.pairs_scanned += 1,
            ScanEvent::PairSkipped => self.pairs_skipped += 1,
            ScanEvent::Found => self.opportunities_found += 1,
            ScanEvent::Outcome {
                outcome,
                profit_usd,
            } => match outcome {
                ExecutionOutcome::Executed(_) => {
                    self.executed += 1;
                    self.profit_usd += *profit_usd;
                }
                ExecutionOutcome::Queued(_) => self.queued += 1,
                ExecutionOutcome::Rejected(_) => self.rejected += 1,
                ExecutionOutcome::Failed(_) => self.failed += 1,
            },
            ScanEvent::Error => self.errors += 1,
        }
    }

    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.finished_at = Some(at);
    }

    pub fn log(&self) {
        info!(
            scan = self.scan_number,
            networks = self.networks_scanned,
            pairs = self.pairs_scanned,
            found = self.opportunities_found,
            executed = self.executed,
            queued = self.queued,
            rejected = self.rejected,
            errors = self.errors,
            profit = format!("${:.2}", self.profit_usd),
            cancelled = self.cancelled,
            "Scan cycle complete"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
