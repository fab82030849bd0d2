//! In-memory backend implementation.

use crate::audit::backend::{BackendType, ChainHead, LedgerBackend};
use crate::audit::filter::DecisionFilter;
use crate::audit::record::{DecisionRecord, RecordId};
use crate::core::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Process-lifetime ledger store.
#[derive(Default)]
pub struct MemoryBackend {
    records: RwLock<Vec<DecisionRecord>>,
}

impl MemoryBackend {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerBackend for MemoryBackend {
    async fn append(&self, record: &DecisionRecord) -> Result<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn read(&self, id: &RecordId) -> Result<Option<DecisionRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| &r.record_id == id).cloned())
    }

    async fn query(&self, filter: &DecisionFilter) -> Result<Vec<DecisionRecord>> {
        let records = self.records.read().await;
        Ok(filter.apply(records.iter()))
    }

    async fn head(&self) -> Result<Option<ChainHead>> {
        let records = self.records.read().await;
        Ok(records.last().map(|r| ChainHead {
            sequence: r.sequence,
            hash: r.hash.clone(),
        }))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.records.read().await.len() as u64)
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Memory
    }
}
