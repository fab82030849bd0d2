//! Decision record structure.
//!
//! One record per evaluated proposal. Records are sealed by the ledger
//! writer with a sequence number and a SHA3-256 link to their predecessor.

use crate::consensus::engine::{Deliberation, Termination};
use crate::consensus::gates::{has_fatal, GateViolation};
use crate::consensus::panel::GovernanceMode;
use crate::consensus::voting::{Verdict, VotingRound};
use crate::core::{now, Hash256, Result, Timestamp};
use crate::proposal::Proposal;
use serde::{Deserialize, Serialize};

/// Unique record identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    /// Create a record ID.
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

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The full account of one governance decision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Unique record ID
    pub record_id: RecordId,
    /// Position in the ledger, assigned on append
    pub sequence: u64,
    /// Governance instance that made the decision
    pub instance_id: String,
    /// Proposal as submitted
    pub proposal: Proposal,
    /// Shared context key used for fork detection
    pub context_id: String,
    pub gate_violations: Vec<GateViolation>,
    pub rounds: Vec<VotingRound>,
    /// Compromises derived during deliberation
    pub synthesized: Vec<Proposal>,
    pub final_verdict: Verdict,
    pub synthesis_applied: bool,
    pub governance_mode: GovernanceMode,
    pub termination: Termination,
    /// Configuration version in force
    pub config_version: u64,
    pub timestamp: Timestamp,
    /// Hash of the previous record (zero for the first)
    pub prev_hash: Hash256,
    /// Hash of this record
    pub hash: Hash256,
}

impl DecisionRecord {
    /// Create an unsealed record with no rounds. Until an outcome is set it
    /// reads as blocked.
    pub fn new(
        instance_id: &str,
        proposal: Proposal,
        governance_mode: GovernanceMode,
        config_version: u64,
    ) -> Self {
        Self {
            record_id: RecordId::generate(),
            sequence: 0,
            instance_id: instance_id.to_string(),
            context_id: proposal.context().context_id.clone(),
            proposal,
            gate_violations: Vec::new(),
            rounds: Vec::new(),
            synthesized: Vec::new(),
            final_verdict: Verdict::Blocked,
            synthesis_applied: false,
            governance_mode,
            termination: Termination::Blocked,
            config_version,
            timestamp: now(),
            prev_hash: Hash256::zero(),
            hash: Hash256::zero(),
        }
    }

    /// Append gate violations.
    pub fn with_violations(mut self, violations: Vec<GateViolation>) -> Self {
        self.gate_violations.extend(violations);
        self
    }

    /// Set verdict and termination for a decision that never deliberated.
    pub fn with_outcome(mut self, final_verdict: Verdict, termination: Termination) -> Self {
        self.final_verdict = final_verdict;
        self.termination = termination;
        self
    }

    /// Take the result of a deliberation.
    pub fn with_deliberation(mut self, deliberation: Deliberation) -> Self {
        self.final_verdict = deliberation.final_verdict();
        self.synthesis_applied = deliberation.synthesis_applied();
        self.termination = deliberation.termination;
        self.gate_violations.extend(deliberation.violations);
        self.rounds = deliberation.rounds;
        self.synthesized = deliberation.synthesized;
        self
    }

    /// Set an explicit record ID.
    pub fn with_record_id(mut self, record_id: RecordId) -> Self {
        self.record_id = record_id;
        self
    }

    /// Whether the decision allows the action.
    pub fn approved(&self) -> bool {
        self.final_verdict.is_approved() && self.termination == Termination::Approved
    }

    pub fn has_fatal_violation(&self) -> bool {
        has_fatal(&self.gate_violations)
    }

    /// Last round, if any voting happened.
    pub fn last_round(&self) -> Option<&VotingRound> {
        self.rounds.last()
    }

    /// Hash over the record content with `hash` itself zeroed.
    pub fn compute_hash(&self) -> Result<Hash256> {
        let mut unsealed = self.clone();
        unsealed.hash = Hash256::zero();
        let body = serde_json::to_vec(&unsealed)?;

        Ok(Hash256::digest(&[
            &self.sequence.to_le_bytes(),
            self.prev_hash.as_bytes(),
            &body,
        ]))
    }

    /// Fix the record's chain position and hash.
    pub(crate) fn seal(&mut self, sequence: u64, prev_hash: Hash256) -> Result<()> {
        self.sequence = sequence;
        self.prev_hash = prev_hash;
        self.hash = self.compute_hash()?;
        Ok(())
    }

    /// Check the stored hash against the content.
    pub fn verify_hash(&self) -> Result<bool> {
        Ok(self.compute_hash()? == self.hash)
    }
}
