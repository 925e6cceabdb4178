//! Approval book for manual-mode execution.
//!
//! Records live in a map keyed by id. A separate pending index (ordered by
//! submission) makes listing cost O(pending) rather than O(everything ever
//! submitted). Resolved ids are retained in a bounded ring; once it evicts,
//! the evicted record is dropped from the map.

use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::engine::history::RingBuffer;
use crate::error::ApprovalError;
use crate::types::{ApprovalRecord, ApprovalStatus, Opportunity};

pub struct ApprovalBook {
    records: HashMap<String, ApprovalRecord>,
    pending: BTreeMap<u64, String>,
    resolved: RingBuffer<String>,
    next_seq: u64,
}

impl ApprovalBook {
    pub fn new(resolved_capacity: NonZeroUsize) -> Self {
        Self {
            records: HashMap::new(),
            pending: BTreeMap::new(),
            resolved: RingBuffer::new(resolved_capacity),
            next_seq: 0,
        }
    }

    /// Store a new pending record and return its id.
    pub fn submit(&mut self, opportunity: Arc<Opportunity>) -> String {
        let seq = self.next_seq;
        self.next_seq += 1;
        let id = format!("approval-{seq}-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);

        self.records.insert(
            id.clone(),
            ApprovalRecord {
                id: id.clone(),
                seq,
                opportunity,
                submitted_at: Utc::now(),
                status: ApprovalStatus::Pending,
                resolved_at: None,
            },
        );
        self.pending.insert(seq, id.clone());
        id
    }

    /// Move a pending record to a terminal status. One-shot: a second call on
    /// the same id fails with `AlreadyResolved`.
    pub fn resolve(
        &mut self,
        id: &str,
        status: ApprovalStatus,
    ) -> Result<Arc<Opportunity>, ApprovalError> {
        debug_assert!(status.is_terminal());
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| ApprovalError::Unknown(id.to_string()))?;

        if record.status.is_terminal() {
            return Err(ApprovalError::AlreadyResolved {
                id: id.to_string(),
                status: record.status,
            });
        }

        record.status = status;
        record.resolved_at = Some(Utc::now());
        self.pending.remove(&record.seq);
        let opportunity = Arc::clone(&record.opportunity);

        if let Some(evicted) = self.resolved.push(id.to_string()) {
            self.records.remove(&evicted);
        }
        Ok(opportunity)
    }

    /// Pending records in submission order.
    pub fn pending(&self) -> Vec<ApprovalRecord> {
        self.pending
            .values()
            .filter_map(|id| self.records.get(id).cloned())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn get(&self, id: &str) -> Option<&ApprovalRecord> {
        self.records.get(id)
    }

    /// Records currently held (pending plus retained resolved ones).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
