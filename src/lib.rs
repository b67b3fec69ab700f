//! RSI Trading Agent Library
//!
//! Core components of an automated Solana trading agent: strategy
//! evaluation, trade validation and execution, persistence and the
//! per-cycle orchestration that ties them together.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
pub mod rate_limit;
pub mod retry;
pub mod secrets;
