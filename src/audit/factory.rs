//! Backend factory.
//!
//! Creates ledger backends based on configuration.

use crate::audit::backend::LedgerBackend;
use crate::audit::backends::{JsonlBackend, MemoryBackend};
use crate::audit::config::LedgerConfig;
use crate::core::Result;
use std::sync::Arc;

/// Create a ledger backend from configuration.
pub fn create_ledger_backend(config: &LedgerConfig) -> Result<Arc<dyn LedgerBackend>> {
    match config {
        LedgerConfig::Memory => Ok(Arc::new(MemoryBackend::new()) as Arc<dyn LedgerBackend>),
        LedgerConfig::Jsonl { path } => {
            let backend = JsonlBackend::open(path)?;
            Ok(Arc::new(backend) as Arc<dyn LedgerBackend>)
        }
    }
}
