//! Single-account balance ledger over a shared key-value store.
//!
//! Charges can run with one of three strategies, see [`strategy::Strategy`].
//! The naive one loses updates under concurrency; the optimistic (watch +
//! conditional transaction) and pessimistic (TTL'd lock key) ones do not.

pub mod api;
pub mod config;
pub mod domain;
pub mod engine;
pub mod memory_store;
pub mod redis_store;
pub mod strategy;

pub use config::Config;
pub use domain::{Balance, ChargeOutcome, ChargeResult, LedgerError, StoreError};
pub use engine::{Ledger, LedgerSettings};
pub use memory_store::MemoryStore;
pub use redis_store::RedisStore;
pub use strategy::Strategy;
