//! Fork lineage types.
//!
//! A lineage preserves incompatible decisions reached by independent
//! instances on the same context. It only grows: decisions,
//! acknowledgments and recognitions are added, nothing is removed, merged
//! or overruled.

use crate::audit::record::{DecisionRecord, RecordId};
use crate::consensus::voting::Verdict;
use crate::core::{now, Hash256, Timestamp};
use serde::{Deserialize, Serialize};

/// Unique lineage identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineageId(pub String);

impl LineageId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Generate a unique ID.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LineageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One side of a fork, summarized from its decision record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompetingDecision {
    pub record_id: RecordId,
    pub instance_id: String,
    pub final_verdict: Verdict,
    pub approved: bool,
    /// Ledger hash of the record, for cross-checking against the ledger
    pub record_hash: Hash256,
    pub decided_at: Timestamp,
}

impl CompetingDecision {
    pub fn from_record(record: &DecisionRecord) -> Self {
        Self {
            record_id: record.record_id.clone(),
            instance_id: record.instance_id.clone(),
            final_verdict: record.final_verdict,
            approved: record.approved(),
            record_hash: record.hash.clone(),
            decided_at: record.timestamp,
        }
    }

    /// Two decisions compete when different instances reached opposite
    /// outcomes.
    pub fn competes_with(&self, other: &CompetingDecision) -> bool {
        self.instance_id != other.instance_id && self.approved != other.approved
    }
}

/// An instance declaring it knows about the fork. Changes no verdict.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Acknowledgment {
    pub instance_id: String,
    pub note: String,
    pub acknowledged_at: Timestamp,
}

impl Acknowledgment {
    pub fn new(instance_id: &str, note: &str) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            note: note.to_string(),
            acknowledged_at: now(),
        }
    }
}

/// A third party lending weight to one side of a fork.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    pub record_id: RecordId,
    pub recognizer: String,
    pub basis: String,
    pub recognized_at: Timestamp,
}

impl Recognition {
    pub fn new(record_id: RecordId, recognizer: &str, basis: &str) -> Self {
        Self {
            record_id,
            recognizer: recognizer.to_string(),
            basis: basis.to_string(),
            recognized_at: now(),
        }
    }
}

/// The preserved record of a fork.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForkLineage {
    lineage_id: LineageId,
    context_id: String,
    competing_decisions: Vec<CompetingDecision>,
    acknowledgments: Vec<Acknowledgment>,
    recognitions: Vec<Recognition>,
    opened_at: Timestamp,
}

impl ForkLineage {
    pub(crate) fn open(
        lineage_id: LineageId,
        context_id: &str,
        decisions: Vec<CompetingDecision>,
        opened_at: Timestamp,
    ) -> Self {
        Self {
            lineage_id,
            context_id: context_id.to_string(),
            competing_decisions: decisions,
            acknowledgments: Vec::new(),
            recognitions: Vec::new(),
            opened_at,
        }
    }

    pub fn lineage_id(&self) -> &LineageId {
        &self.lineage_id
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn competing_decisions(&self) -> &[CompetingDecision] {
        &self.competing_decisions
    }

    pub fn acknowledgments(&self) -> &[Acknowledgment] {
        &self.acknowledgments
    }

    pub fn recognitions(&self) -> &[Recognition] {
        &self.recognitions
    }

    pub fn opened_at(&self) -> Timestamp {
        self.opened_at
    }

    pub fn contains(&self, record_id: &RecordId) -> bool {
        self.competing_decisions
            .iter()
            .any(|d| &d.record_id == record_id)
    }

    /// How many recognitions a side has collected.
    pub fn recognition_count(&self, record_id: &RecordId) -> usize {
        self.recognitions
            .iter()
            .filter(|r| &r.record_id == record_id)
            .count()
    }

    pub fn is_acknowledged_by(&self, instance_id: &str) -> bool {
        self.acknowledgments
            .iter()
            .any(|a| a.instance_id == instance_id)
    }

    /// Returns false if the decision is already present.
    pub(crate) fn add_decision(&mut self, decision: CompetingDecision) -> bool {
        if self.contains(&decision.record_id) {
            return false;
        }
        self.competing_decisions.push(decision);
        true
    }

    pub(crate) fn add_acknowledgment(&mut self, acknowledgment: Acknowledgment) {
        self.acknowledgments.push(acknowledgment);
    }

    pub(crate) fn add_recognition(&mut self, recognition: Recognition) {
        self.recognitions.push(recognition);
    }
}
