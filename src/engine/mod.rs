//! Core engine: the scan, gate and execute pipeline.

pub mod accountant;
pub mod approvals;
pub mod executor;
pub mod history;
pub mod scanner;
pub mod stats;

pub use executor::{ExecutionEngine, ExecutionOutcome};
pub use scanner::{AutonomousScanner, NetworkRuntime, ScannerSettings};
