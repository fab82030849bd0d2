//! Audit Ledger
//!
//! Append-only, hash-chained record of every governance decision:
//! - Single writer task serializing appends
//! - Memory and JSONL backends
//! - Filtered read-back and chain verification

pub mod backend;
pub mod backends;
pub mod config;
pub mod factory;
pub mod filter;
pub mod ledger;
pub mod record;

pub use backend::{BackendType, ChainHead, LedgerBackend};
pub use backends::{JsonlBackend, MemoryBackend};
pub use config::LedgerConfig;
pub use factory::create_ledger_backend;
pub use filter::DecisionFilter;
pub use ledger::AuditLedger;
pub use record::{DecisionRecord, RecordId};
