//! Incremental execution statistics.
//!
//! Counters only move through `record_success` / `record_failure`, so
//! `successful + failed == total_executions` holds after every call and
//! reading them is O(1) regardless of how much history has been discarded.

use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsCounters {
    total_executions: u64,
    successful: u64,
    failed: u64,
    total_profit_usd: Decimal,
}

impl StatsCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, profit_usd: Decimal) {
        self.total_executions += 1;
        self.successful += 1;
        self.total_profit_usd += profit_usd;
    }

    pub fn record_failure(&mut self) {
        self.total_executions += 1;
        self.failed += 1;
    }

    /// Fold another set of counters into this one (cross-network totals).
    pub fn absorb(&mut self, other: &StatsCounters) {
        self.total_executions += other.total_executions;
        self.successful += other.successful;
        self.failed += other.failed;
        self.total_profit_usd += other.total_profit_usd;
    }

    pub fn total_executions(&self) -> u64 {
        self.total_executions
    }

    pub fn successful(&self) -> u64 {
        self.successful
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn total_profit_usd(&self) -> Decimal {
        self.total_profit_usd
    }

    /// Success rate as a percentage. Returns 0.0 before the first execution.
    pub fn success_rate(&self) -> f64 {
        if self.total_executions == 0 {
            0.0
        } else {
            (self.successful as f64 / self.total_executions as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_success_and_failure_invariant() {
        let mut s = StatsCounters::new();
        s.record_success(dec!(100));
        s.record_failure();
        s.record_success(dec!(25.5));
        assert_eq!(s.total_executions(), 3);
        assert_eq!(s.successful() + s.failed(), s.total_executions());
        assert_eq!(s.total_profit_usd(), dec!(125.5));
    }

    #[test]
    fn test_failure_does_not_touch_profit() {
        let mut s = StatsCounters::new();
        s.record_failure();
        assert_eq!(s.total_profit_usd(), Decimal::ZERO);
        assert_eq!(s.failed(), 1);
        assert_eq!(s.success_rate(), 0.0);
    }

    #[test]
    fn test_absorb() {
        let mut a = StatsCounters::new();
        a.record_success(dec!(10));
        let mut b = StatsCounters::new();
        b.record_success(dec!(5));
        b.record_failure();
        a.absorb(&b);
        assert_eq!(a.total_executions(), 3);
        assert_eq!(a.successful(), 2);
        assert_eq!(a.failed(), 1);
        assert_eq!(a.total_profit_usd(), dec!(15));
    }

    #[test]
    fn test_n_successes_sum_exactly() {
        let mut s = StatsCounters::new();
        for _ in 0..10_000 {
            s.record_success(dec!(12.34));
        }
        assert_eq!(s.total_profit_usd(), dec!(123400));
        assert_eq!(s.successful(), 10_000);
        assert_eq!(s.failed(), 0);
    }
}
