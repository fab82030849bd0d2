//! JSON lines backend implementation.
//!
//! One sealed record per line, appended and flushed to disk before the
//! append is acknowledged. Existing lines are loaded when the store opens;
//! a torn final line is cut from the file before appending resumes.

use crate::audit::backend::{BackendType, ChainHead, LedgerBackend};
use crate::audit::filter::DecisionFilter;
use crate::audit::record::{DecisionRecord, RecordId};
use crate::core::{jsonl, Error, Result};
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::RwLock;
use tracing::debug;

/// Append-only JSONL ledger store.
pub struct JsonlBackend {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    records: RwLock<Vec<DecisionRecord>>,
}

impl JsonlBackend {
    /// Open (or create) the store at `path` and load what it holds.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let records = if path.exists() {
            jsonl::read_lines(path)?
        } else {
            Vec::new()
        };
        debug!(path = %path.display(), records = records.len(), "ledger store opened");

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
            records: RwLock::new(records),
        })
    }

    /// Get the path to the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&self, line: &str) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| Error::LedgerWriteFailure("ledger writer lock poisoned".to_string()))?;

        jsonl::append_line(&mut writer, line)
            .map_err(|e| Error::LedgerWriteFailure(format!("{}: {}", self.path.display(), e)))
    }
}

#[async_trait]
impl LedgerBackend for JsonlBackend {
    async fn append(&self, record: &DecisionRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        self.write_line(&line)?;
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
        BackendType::Jsonl
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.writer.lock().is_ok())
    }
}

impl Drop for JsonlBackend {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}
