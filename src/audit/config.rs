//! Ledger backend configuration.

use crate::audit::backend::BackendType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which ledger store to open.
///
/// In TOML:
///
/// ```toml
/// [ledger]
/// backend = "jsonl"
/// path = "/var/lib/governor/decisions.jsonl"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum LedgerConfig {
    /// Records live for the life of the process
    Memory,
    /// Records are appended to a JSON lines file and reloaded on open
    Jsonl { path: PathBuf },
}

impl LedgerConfig {
    /// Create JSONL config.
    pub fn jsonl(path: impl Into<PathBuf>) -> Self {
        LedgerConfig::Jsonl { path: path.into() }
    }

    pub fn backend_type(&self) -> BackendType {
        match self {
            LedgerConfig::Memory => BackendType::Memory,
            LedgerConfig::Jsonl { .. } => BackendType::Jsonl,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig::Memory
    }
}
