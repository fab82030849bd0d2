//! Append-only audit ledger.
//!
//! A single writer task owns the write side of the backend. Appends are
//! sent over a channel and acknowledged through a oneshot reply, so records
//! are sealed strictly in arrival order: each one gets the next sequence
//! number and the hash of its predecessor.

use crate::audit::backend::{BackendType, ChainHead, LedgerBackend};
use crate::audit::backends::MemoryBackend;
use crate::audit::config::LedgerConfig;
use crate::audit::factory::create_ledger_backend;
use crate::audit::filter::DecisionFilter;
use crate::audit::record::{DecisionRecord, RecordId};
use crate::core::{Error, Hash256, Result, Timestamp};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

/// Pending appends the writer will queue before senders wait.
const WRITE_QUEUE_DEPTH: usize = 256;

enum Command {
    Append {
        record: Box<DecisionRecord>,
        reply: oneshot::Sender<Result<DecisionRecord>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the ledger. Cheap to clone; all clones feed the same writer.
#[derive(Clone)]
pub struct AuditLedger {
    backend: Arc<dyn LedgerBackend>,
    tx: mpsc::Sender<Command>,
}

impl AuditLedger {
    /// Start the writer task over `backend`, continuing its existing chain.
    pub async fn start(backend: Arc<dyn LedgerBackend>) -> Result<Self> {
        let head = backend.head().await?;
        let (tx, rx) = mpsc::channel(WRITE_QUEUE_DEPTH);

        info!(
            backend = %backend.backend_type(),
            head = ?head.as_ref().map(|h| h.sequence),
            "audit ledger started"
        );
        tokio::spawn(run_writer(Arc::clone(&backend), rx, head));

        Ok(Self { backend, tx })
    }

    /// Open the backend named by `config` and start the ledger.
    pub async fn open(config: &LedgerConfig) -> Result<Self> {
        Self::start(create_ledger_backend(config)?).await
    }

    /// Ledger over a fresh in-memory store.
    pub async fn in_memory() -> Result<Self> {
        Self::start(Arc::new(MemoryBackend::new())).await
    }

    /// Append a decision record. Returns its ID once it is durable.
    pub async fn append(&self, record: DecisionRecord) -> Result<RecordId> {
        self.commit(record).await.map(|sealed| sealed.record_id)
    }

    /// Append and return the sealed record.
    pub(crate) async fn commit(&self, record: DecisionRecord) -> Result<DecisionRecord> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Append {
                record: Box::new(record),
                reply,
            })
            .await
            .map_err(|_| Error::LedgerClosed)?;
        rx.await.map_err(|_| Error::LedgerClosed)?
    }

    pub async fn read(&self, id: &RecordId) -> Result<Option<DecisionRecord>> {
        self.backend.read(id).await
    }

    pub async fn query(&self, filter: &DecisionFilter) -> Result<Vec<DecisionRecord>> {
        self.backend.query(filter).await
    }

    /// Records at or after `since`, or all records, in ledger order.
    pub async fn list_decisions(&self, since: Option<Timestamp>) -> Result<Vec<DecisionRecord>> {
        let mut filter = DecisionFilter::new();
        filter.since = since;
        self.backend.query(&filter).await
    }

    pub async fn count(&self) -> Result<u64> {
        self.backend.count().await
    }

    pub async fn head(&self) -> Result<Option<ChainHead>> {
        self.backend.head().await
    }

    pub fn backend_type(&self) -> BackendType {
        self.backend.backend_type()
    }

    /// Walk the whole chain. Returns the number of records checked, or
    /// `ChainIntegrityViolated` with the first bad sequence number.
    pub async fn verify_chain(&self) -> Result<u64> {
        let records = self.backend.query(&DecisionFilter::new()).await?;
        let mut prev_hash = Hash256::zero();

        for (index, record) in records.iter().enumerate() {
            let intact = record.sequence == index as u64
                && record.prev_hash == prev_hash
                && record.verify_hash()?;
            if !intact {
                error!(sequence = record.sequence, "ledger chain broken");
                return Err(Error::ChainIntegrityViolated(record.sequence));
            }
            prev_hash = record.hash.clone();
        }

        Ok(records.len() as u64)
    }

    /// Stop the writer. Later appends fail with `LedgerClosed`.
    pub async fn close(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Close { reply })
            .await
            .map_err(|_| Error::LedgerClosed)?;
        rx.await.map_err(|_| Error::LedgerClosed)
    }
}

async fn run_writer(
    backend: Arc<dyn LedgerBackend>,
    mut rx: mpsc::Receiver<Command>,
    head: Option<ChainHead>,
) {
    let (mut next_sequence, mut prev_hash) = match head {
        Some(head) => (head.sequence + 1, head.hash),
        None => (0, Hash256::zero()),
    };

    while let Some(command) = rx.recv().await {
        match command {
            Command::Append { record, reply } => {
                let result =
                    seal_and_store(backend.as_ref(), *record, next_sequence, prev_hash.clone())
                        .await;
                match &result {
                    Ok(sealed) => {
                        debug!(
                            sequence = sealed.sequence,
                            record_id = %sealed.record_id,
                            "decision record appended"
                        );
                        next_sequence += 1;
                        prev_hash = sealed.hash.clone();
                    }
                    Err(e) => error!(error = %e, sequence = next_sequence, "ledger append failed"),
                }
                let _ = reply.send(result);
            }
            Command::Close { reply } => {
                rx.close();
                let _ = reply.send(());
                break;
            }
        }
    }

    debug!("ledger writer stopped");
}

async fn seal_and_store(
    backend: &dyn LedgerBackend,
    mut record: DecisionRecord,
    sequence: u64,
    prev_hash: Hash256,
) -> Result<DecisionRecord> {
    record.seal(sequence, prev_hash)?;
    backend.append(&record).await.map_err(|e| match e {
        Error::LedgerWriteFailure(_) => e,
        other => Error::LedgerWriteFailure(other.to_string()),
    })?;
    Ok(record)
}
