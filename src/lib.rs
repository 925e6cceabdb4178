//! ARBITER: autonomous multi-network opportunity scanner
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod error;
pub mod policy;
pub mod audit;
pub mod sources;
pub mod strategy;
pub mod execution;
pub mod engine;
pub mod api;
