//! Audit trail for pipeline decisions.
//!
//! The core only ever calls [`AuditSink::record`]; sinks are fire-and-forget
//! and must never surface a failure to the caller. `TracingAudit` renders
//! events as log lines, `JsonlAudit` appends a durable JSON-lines trail.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::types::ApprovalStatus;

/// A structured event emitted by the scanner or an execution engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    ScanStarted {
        network: String,
        pairs: usize,
    },
    OpportunityFound {
        network: String,
        kind: String,
        estimated_profit_usd: Decimal,
    },
    SafetyCheckFailed {
        network: String,
        check: String,
        reason: String,
    },
    OpportunityRejected {
        network: String,
        kind: String,
        reason: String,
    },
    ApprovalSubmitted {
        network: String,
        approval_id: String,
    },
    ApprovalResolved {
        network: String,
        approval_id: String,
        status: ApprovalStatus,
    },
    TransactionSubmitted {
        network: String,
        tx_reference: String,
        estimated_profit_usd: Decimal,
    },
    TransactionSucceeded {
        network: String,
        tx_reference: String,
        profit_usd: Decimal,
    },
    TransactionFailed {
        network: String,
        tx_reference: Option<String>,
        error: String,
    },
    PolicyUpdated {
        fields: Vec<String>,
    },
}

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

// ---------------------------------------------------------------------------
// Tracing sink
// ---------------------------------------------------------------------------

/// Renders audit events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record(&self, event: &AuditEvent) {
        match event {
            AuditEvent::ScanStarted { network, pairs } => {
                info!(network = %network, pairs, "Starting network scan");
            }
            AuditEvent::OpportunityFound {
                network,
                kind,
                estimated_profit_usd,
            } => {
                info!(
                    network = %network,
                    kind = %kind,
                    profit = format!("${:.2}", estimated_profit_usd),
                    "Opportunity found"
                );
            }
            AuditEvent::SafetyCheckFailed {
                network,
                check,
                reason,
            } => {
                warn!(network = %network, check = %check, reason = %reason, "Safety check failed");
            }
            AuditEvent::OpportunityRejected {
                network,
                kind,
                reason,
            } => {
                warn!(network = %network, kind = %kind, reason = %reason, "Opportunity rejected");
            }
            AuditEvent::ApprovalSubmitted {
                network,
                approval_id,
            } => {
                info!(network = %network, approval_id = %approval_id, "Submitted for approval");
            }
            AuditEvent::ApprovalResolved {
                network,
                approval_id,
                status,
            } => {
                info!(network = %network, approval_id = %approval_id, status = %status, "Approval resolved");
            }
            AuditEvent::TransactionSubmitted {
                network,
                tx_reference,
                estimated_profit_usd,
            } => {
                info!(
                    network = %network,
                    tx = %tx_reference,
                    profit = format!("${:.2}", estimated_profit_usd),
                    "Transaction submitted"
                );
            }
            AuditEvent::TransactionSucceeded {
                network,
                tx_reference,
                profit_usd,
            } => {
                info!(
                    network = %network,
                    tx = %tx_reference,
                    profit = format!("${:.2}", profit_usd),
                    "Transaction successful"
                );
            }
            AuditEvent::TransactionFailed {
                network,
                tx_reference,
                error: err,
            } => {
                error!(
                    network = %network,
                    tx = tx_reference.as_deref().unwrap_or("N/A"),
                    error = %err,
                    "Transaction failed"
                );
            }
            AuditEvent::PolicyUpdated { fields } => {
                info!(fields = ?fields, "Policy updated");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// JSON-lines sink
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct JsonlEntry<'a> {
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    event: &'a AuditEvent,
}

/// Appends one JSON object per event to a file.
pub struct JsonlAudit {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl JsonlAudit {
    /// Create a sink writing to `path`. The file is opened lazily so a
    /// missing directory only costs a warning per event, never a startup failure.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: Mutex::new(None),
        }
    }

    fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut guard = self.file.lock();
        if guard.is_none() {
            *guard = Some(OpenOptions::new().create(true).append(true).open(&self.path)?);
        }
        match guard.as_mut() {
            Some(file) => writeln!(file, "{line}"),
            None => Ok(()),
        }
    }
}

impl AuditSink for JsonlAudit {
    fn record(&self, event: &AuditEvent) {
        let entry = JsonlEntry {
            timestamp: Utc::now(),
            event,
        };
        let line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to serialise audit event");
                return;
            }
        };
        if let Err(e) = self.write_line(&line) {
            warn!(path = %self.path.display(), error = %e, "Failed to write audit trail");
        }
    }
}

// ---------------------------------------------------------------------------
// Fan-out and in-memory sinks
// ---------------------------------------------------------------------------

/// Forwards every event to each inner sink.
#[derive(Default, Clone)]
pub struct FanoutAudit {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAudit {
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn AuditSink>) {
        self.sinks.push(sink);
    }
}

impl AuditSink for FanoutAudit {
    fn record(&self, event: &AuditEvent) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }
}

/// Keeps events in memory. Handy for embedding and for tests.
#[derive(Default)]
pub struct MemoryAudit {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&AuditEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }
}

impl AuditSink for MemoryAudit {
    fn record(&self, event: &AuditEvent) {
        self.events.lock().push(event.clone());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
