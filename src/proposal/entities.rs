//! Proposal representation.
//!
//! A proposal is immutable once created. Synthesis never edits a proposal;
//! it derives a child proposal that records where it came from.

use crate::core::{now, Axiom, Error, Result, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique proposal identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProposalId(pub String);

impl ProposalId {
    /// Create a proposal ID from a string.
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Generate a unique ID.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the ID string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProposalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How hard an action is to undo.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reversibility {
    Reversible,
    Moderate,
    Irreversible,
}

impl Default for Reversibility {
    fn default() -> Self {
        Self::Moderate
    }
}

/// Caller-declared scrutiny level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Criticality {
    Routine = 0,
    Normal = 1,
    Important = 2,
    Critical = 3,
}

impl Default for Criticality {
    fn default() -> Self {
        Self::Normal
    }
}

/// Record counts before and after an action, when the caller knows them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryFootprint {
    pub before: u64,
    pub after: u64,
}

impl MemoryFootprint {
    /// Whether the action leaves fewer records than it found.
    pub fn shrinks(&self) -> bool {
        self.after < self.before
    }
}

/// Structured context attached to a proposal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProposalContext {
    /// Shared identifier of the situation being governed
    pub context_id: String,
    /// Entity initiating the action
    pub source: Option<String>,
    /// Entity the action applies to
    pub target: Option<String>,
    /// Whether the process (not only the outcome) is logged
    pub logs_process: bool,
    /// Whether the outcome is logged
    pub logs_outcome: bool,
    /// Memory size comparison
    pub memory: Option<MemoryFootprint>,
    /// Free-form attributes
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl ProposalContext {
    /// Create a context for the given situation.
    pub fn new(context_id: &str) -> Self {
        Self {
            context_id: context_id.to_string(),
            source: None,
            target: None,
            logs_process: false,
            logs_outcome: false,
            memory: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Declare the source entity.
    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    /// Declare the target entity.
    pub fn with_target(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }

    /// Declare which parts of the action are logged.
    pub fn with_logging(mut self, process: bool, outcome: bool) -> Self {
        self.logs_process = process;
        self.logs_outcome = outcome;
        self
    }

    /// Declare the memory footprint.
    pub fn with_memory(mut self, before: u64, after: u64) -> Self {
        self.memory = Some(MemoryFootprint { before, after });
        self
    }

    /// Add a free-form attribute.
    pub fn with_attribute(mut self, key: &str, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.attributes.insert(key.to_string(), v);
        }
        self
    }
}

impl Default for ProposalContext {
    fn default() -> Self {
        Self::new(&uuid::Uuid::new_v4().to_string())
    }
}

/// Provenance of a synthesized proposal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SynthesisOrigin {
    /// Proposal this one was derived from
    pub parent_id: ProposalId,
    /// Round whose conflict triggered the synthesis
    pub derived_from_round: u32,
    /// Template used
    pub template: String,
    /// Axioms the compromise keeps intact
    pub preserves: Vec<Axiom>,
    /// What the compromise gives up
    pub sacrifices: Vec<String>,
}

/// Where a proposal came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProposalOrigin {
    Submitted,
    Synthesis(SynthesisOrigin),
}

/// A proposed action awaiting governance.
///
/// Deserialization goes through the same checks as [`Proposal::new`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredProposal")]
pub struct Proposal {
    id: ProposalId,
    action: String,
    intent: String,
    reversibility: Reversibility,
    criticality: Criticality,
    context: ProposalContext,
    origin: ProposalOrigin,
    submitted_at: Timestamp,
}

/// Wire form of a [`Proposal`] before validation.
#[derive(Deserialize)]
struct StoredProposal {
    id: ProposalId,
    action: String,
    intent: String,
    reversibility: Reversibility,
    criticality: Criticality,
    context: ProposalContext,
    origin: ProposalOrigin,
    submitted_at: Timestamp,
}

impl TryFrom<StoredProposal> for Proposal {
    type Error = Error;

    fn try_from(stored: StoredProposal) -> Result<Self> {
        Proposal::check(&stored.action, &stored.context)?;
        Ok(Self {
            id: stored.id,
            action: stored.action,
            intent: stored.intent,
            reversibility: stored.reversibility,
            criticality: stored.criticality,
            context: stored.context,
            origin: stored.origin,
            submitted_at: stored.submitted_at,
        })
    }
}

impl Proposal {
    fn check(action: &str, context: &ProposalContext) -> Result<()> {
        if action.trim().is_empty() {
            return Err(Error::InvalidProposal("action must not be empty".to_string()));
        }
        if context.context_id.trim().is_empty() {
            return Err(Error::InvalidProposal(
                "context_id must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Create a caller-submitted proposal.
    pub fn new(
        action: &str,
        intent: &str,
        reversibility: Reversibility,
        criticality: Criticality,
        context: ProposalContext,
    ) -> Result<Self> {
        let action = action.trim();
        Self::check(action, &context)?;

        Ok(Self {
            id: ProposalId::generate(),
            action: action.to_string(),
            intent: intent.trim().to_string(),
            reversibility,
            criticality,
            context,
            origin: ProposalOrigin::Submitted,
            submitted_at: now(),
        })
    }

    /// Derive a compromise proposal from `parent`.
    ///
    /// The child keeps the parent's intent and criticality.
    pub(crate) fn synthesized(
        parent: &Proposal,
        action: String,
        reversibility: Reversibility,
        context: ProposalContext,
        origin: SynthesisOrigin,
    ) -> Self {
        Self {
            id: ProposalId::generate(),
            action,
            intent: parent.intent.clone(),
            reversibility,
            criticality: parent.criticality,
            context,
            origin: ProposalOrigin::Synthesis(origin),
            submitted_at: now(),
        }
    }

    pub fn id(&self) -> &ProposalId {
        &self.id
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn intent(&self) -> &str {
        &self.intent
    }

    pub fn reversibility(&self) -> Reversibility {
        self.reversibility
    }

    pub fn criticality(&self) -> Criticality {
        self.criticality
    }

    pub fn context(&self) -> &ProposalContext {
        &self.context
    }

    pub fn origin(&self) -> &ProposalOrigin {
        &self.origin
    }

    pub fn submitted_at(&self) -> Timestamp {
        self.submitted_at
    }

    /// Synthesis provenance, if this proposal is a compromise.
    pub fn synthesis(&self) -> Option<&SynthesisOrigin> {
        match &self.origin {
            ProposalOrigin::Synthesis(origin) => Some(origin),
            ProposalOrigin::Submitted => None,
        }
    }

    /// Action and intent as one text for classification.
    pub fn text(&self) -> String {
        if self.intent.is_empty() {
            self.action.clone()
        } else {
            format!("{} {}", self.action, self.intent)
        }
    }
}
