//! JSONL event journal for fork lineages.
//!
//! Every lineage change is one event line, written before the in-memory
//! state changes. Replaying the journal rebuilds the lineages and the
//! decisions still waiting for a rival.

use crate::core::{jsonl, Error, Result, Timestamp};
use crate::fork::lineage::{Acknowledgment, CompetingDecision, LineageId, Recognition};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Where the fork journal lives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkJournalConfig {
    pub path: PathBuf,
}

/// A single lineage change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LineageEvent {
    Opened {
        lineage_id: LineageId,
        context_id: String,
        decisions: Vec<CompetingDecision>,
        at: Timestamp,
    },
    DecisionAdded {
        lineage_id: LineageId,
        decision: CompetingDecision,
    },
    Acknowledged {
        lineage_id: LineageId,
        acknowledgment: Acknowledgment,
    },
    Recognized {
        lineage_id: LineageId,
        recognition: Recognition,
    },
    /// A fatal-free decision with no rival yet
    Observed {
        context_id: String,
        decision: CompetingDecision,
    },
}

impl LineageEvent {
    /// Lineage the event belongs to; `None` for observations.
    pub fn lineage_id(&self) -> Option<&LineageId> {
        match self {
            LineageEvent::Opened { lineage_id, .. }
            | LineageEvent::DecisionAdded { lineage_id, .. }
            | LineageEvent::Acknowledged { lineage_id, .. }
            | LineageEvent::Recognized { lineage_id, .. } => Some(lineage_id),
            LineageEvent::Observed { .. } => None,
        }
    }
}

/// Append-only journal file.
pub struct LineageJournal {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl LineageJournal {
    /// Open (or create) the journal and return the events it holds.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<LineageEvent>)> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let events: Vec<LineageEvent> = if path.exists() {
            jsonl::read_lines(path)?
        } else {
            Vec::new()
        };
        debug!(path = %path.display(), events = events.len(), "fork journal opened");

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok((
            Self {
                path: path.to_path_buf(),
                writer: Mutex::new(BufWriter::new(file)),
            },
            events,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one event and flush it to disk.
    pub fn append(&self, event: &LineageEvent) -> Result<()> {
        let line = serde_json::to_string(event)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| Error::SerializationError("fork journal lock poisoned".to_string()))?;
        jsonl::append_line(&mut writer, &line)?;
        Ok(())
    }
}

impl Drop for LineageJournal {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}
