//! LedgerBackend trait definition.
//!
//! Storage behind the audit ledger. Backends only ever append; there is no
//! update or delete.

use crate::audit::filter::DecisionFilter;
use crate::audit::record::{DecisionRecord, RecordId};
use crate::core::{Hash256, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Backend type identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendType {
    /// Process memory only
    Memory,
    /// Append-only JSON lines file
    Jsonl,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::Memory => write!(f, "memory"),
            BackendType::Jsonl => write!(f, "jsonl"),
        }
    }
}

/// Position of the newest record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainHead {
    pub sequence: u64,
    pub hash: Hash256,
}

/// Core trait for ledger storage.
///
/// Only the ledger's writer task calls `append`, so implementations never
/// see concurrent appends.
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// Persist a sealed record.
    async fn append(&self, record: &DecisionRecord) -> Result<()>;

    /// Read a record by ID.
    async fn read(&self, id: &RecordId) -> Result<Option<DecisionRecord>>;

    /// Records matching a filter, in ledger order.
    async fn query(&self, filter: &DecisionFilter) -> Result<Vec<DecisionRecord>>;

    /// Newest record position, if any.
    async fn head(&self) -> Result<Option<ChainHead>>;

    /// Number of records.
    async fn count(&self) -> Result<u64>;

    /// Get the backend type.
    fn backend_type(&self) -> BackendType;

    /// Health check for the backend.
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
