//! Structural gates checked before any vote is taken.
//!
//! Gates are pure functions of an immutable proposal, so validation is
//! idempotent. A `Fatal` violation aborts the pipeline before voting.

use crate::proposal::{OperationKind, Proposal, Reversibility};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifies which check produced a violation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateId {
    /// Gate 1: source/target entities
    RelationalContext,
    /// Gate 2: non-destructive memory semantics
    MemorySemantics,
    /// Gate 3: process transparency
    ProcessTransparency,
    /// An evaluator did not answer within its deadline
    EvaluationTimeout,
    /// Neither governance path could be reached
    GovernanceUnavailable,
}

impl std::fmt::Display for GateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateId::RelationalContext => write!(f, "RELATIONAL_CONTEXT"),
            GateId::MemorySemantics => write!(f, "MEMORY_SEMANTICS"),
            GateId::ProcessTransparency => write!(f, "PROCESS_TRANSPARENCY"),
            GateId::EvaluationTimeout => write!(f, "EVALUATION_TIMEOUT"),
            GateId::GovernanceUnavailable => write!(f, "GOVERNANCE_UNAVAILABLE"),
        }
    }
}

/// Violation severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Warning,
    Critical,
    Fatal,
}

/// A structural defect found in a proposal or its evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GateViolation {
    pub gate_id: GateId,
    pub severity: Severity,
    pub message: String,
    /// Values that triggered the violation
    pub context: BTreeMap<String, serde_json::Value>,
}

impl GateViolation {
    /// Create a new violation.
    pub fn new(gate_id: GateId, severity: Severity, message: &str) -> Self {
        Self {
            gate_id,
            severity,
            message: message.to_string(),
            context: BTreeMap::new(),
        }
    }

    /// Attach a context value.
    pub fn with_context(mut self, key: &str, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.to_string(), v);
        }
        self
    }

    /// An evaluator missed its deadline or failed. Always fatal: a missing
    /// vote is never counted as approval.
    pub fn evaluation_timeout(member_id: &str, reason: &str) -> Self {
        Self::new(
            GateId::EvaluationTimeout,
            Severity::Fatal,
            &format!("evaluator {} did not deliver a vote: {}", member_id, reason),
        )
        .with_context("member_id", member_id)
    }

    /// No governance path was reachable.
    pub fn governance_unavailable(requested: &str) -> Self {
        Self::new(
            GateId::GovernanceUnavailable,
            Severity::Fatal,
            "governance unavailable on primary and fallback paths; safety default BLOCK",
        )
        .with_context("requested_mode", requested)
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

/// Whether any violation in the set is fatal.
pub fn has_fatal(violations: &[GateViolation]) -> bool {
    violations.iter().any(GateViolation::is_fatal)
}

/// A single structural check.
pub trait Gate: Send + Sync {
    /// Gate identifier.
    fn id(&self) -> GateId;

    /// Check a proposal.
    fn check(&self, proposal: &Proposal) -> Vec<GateViolation>;
}

/// Gate 1: an action must name who acts on what, and must not loop back
/// onto itself.
#[derive(Clone, Debug, Default)]
pub struct RelationalContextGate;

impl Gate for RelationalContextGate {
    fn id(&self) -> GateId {
        GateId::RelationalContext
    }

    fn check(&self, proposal: &Proposal) -> Vec<GateViolation> {
        let ctx = proposal.context();
        match (&ctx.source, &ctx.target) {
            (None, None) => vec![GateViolation::new(
                self.id(),
                Severity::Critical,
                "no source or target entity declared",
            )],
            (Some(source), Some(target)) if source == target => vec![GateViolation::new(
                self.id(),
                Severity::Fatal,
                "source and target are the same entity",
            )
            .with_context("entity", source)],
            _ => Vec::new(),
        }
    }
}

/// Gate 2: recorded memory must not be destroyed.
#[derive(Clone, Debug, Default)]
pub struct MemorySemanticsGate;

impl Gate for MemorySemanticsGate {
    fn id(&self) -> GateId {
        GateId::MemorySemantics
    }

    fn check(&self, proposal: &Proposal) -> Vec<GateViolation> {
        let mut violations = Vec::new();

        if OperationKind::classify(proposal.action()) == OperationKind::Destructive
            && proposal.reversibility() == Reversibility::Irreversible
        {
            violations.push(
                GateViolation::new(
                    self.id(),
                    Severity::Fatal,
                    "irreversible destructive operation on stored memory",
                )
                .with_context("action", proposal.action()),
            );
        }

        if let Some(memory) = proposal.context().memory {
            if memory.shrinks() {
                violations.push(
                    GateViolation::new(self.id(), Severity::Fatal, "memory footprint shrinks")
                        .with_context("before", memory.before)
                        .with_context("after", memory.after),
                );
            }
        }

        violations
    }
}

/// Gate 3: the process, not only its outcome, should leave a trail.
#[derive(Clone, Debug, Default)]
pub struct ProcessTransparencyGate;

impl Gate for ProcessTransparencyGate {
    fn id(&self) -> GateId {
        GateId::ProcessTransparency
    }

    fn check(&self, proposal: &Proposal) -> Vec<GateViolation> {
        let ctx = proposal.context();
        match (ctx.logs_process, ctx.logs_outcome) {
            (true, _) => Vec::new(),
            (false, true) => vec![GateViolation::new(
                self.id(),
                Severity::Warning,
                "only the outcome is logged, not the process",
            )],
            (false, false) => vec![GateViolation::new(
                self.id(),
                Severity::Critical,
                "neither process nor outcome is logged",
            )],
        }
    }
}

/// Runs every registered gate over a proposal.
pub struct GateValidator {
    gates: Vec<Box<dyn Gate>>,
}

impl GateValidator {
    /// Create a validator with no gates.
    pub fn new() -> Self {
        Self { gates: Vec::new() }
    }

    /// Create with the three standard gates.
    pub fn with_defaults() -> Self {
        let mut validator = Self::new();
        validator.add_gate(Box::new(RelationalContextGate));
        validator.add_gate(Box::new(MemorySemanticsGate));
        validator.add_gate(Box::new(ProcessTransparencyGate));
        validator
    }

    /// Add a gate.
    pub fn add_gate(&mut self, gate: Box<dyn Gate>) {
        self.gates.push(gate);
    }

    /// Validate a proposal against all gates, in registration order.
    pub fn validate(&self, proposal: &Proposal) -> Vec<GateViolation> {
        self.gates
            .iter()
            .flat_map(|gate| gate.check(proposal))
            .collect()
    }

    pub fn gate_count(&self) -> usize {
        self.gates.len()
    }
}

impl Default for GateValidator {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::{Criticality, ProposalContext};

    fn proposal(action: &str, reversibility: Reversibility, ctx: ProposalContext) -> Proposal {
        Proposal::new(action, "", reversibility, Criticality::Normal, ctx).unwrap()
    }

    fn full_context() -> ProposalContext {
        ProposalContext::new("ctx")
            .with_source("ops")
            .with_target("store")
            .with_logging(true, true)
    }

    #[test]
    fn test_clean_proposal_passes() {
        let validator = GateValidator::with_defaults();
        let p = proposal("Rotate api keys", Reversibility::Reversible, full_context());
        assert!(validator.validate(&p).is_empty());
        assert_eq!(validator.gate_count(), 3);
    }

    #[test]
    fn test_missing_entities_is_critical() {
        let ctx = ProposalContext::new("ctx").with_logging(true, true);
        let violations = RelationalContextGate.check(&proposal("Rotate keys", Reversibility::Reversible, ctx));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].severity, Severity::Critical);
    }

    #[test]
    fn test_self_reference_is_fatal() {
        let ctx = ProposalContext::new("ctx")
            .with_source("node-a")
            .with_target("node-a");
        let violations = RelationalContextGate.check(&proposal("Sync", Reversibility::Reversible, ctx));
        assert!(has_fatal(&violations));
    }

    #[test]
    fn test_irreversible_delete_is_fatal() {
        let p = proposal("Delete all archives", Reversibility::Irreversible, full_context());
        let violations = GateValidator::with_defaults().validate(&p);
        assert!(has_fatal(&violations));
        assert_eq!(violations[0].gate_id, GateId::MemorySemantics);
    }

    #[test]
    fn test_reversible_delete_is_not_fatal() {
        let p = proposal("Delete old logs", Reversibility::Moderate, full_context());
        assert!(MemorySemanticsGate.check(&p).is_empty());
    }

    #[test]
    fn test_shrinking_memory_is_fatal() {
        let ctx = full_context().with_memory(100, 40);
        let violations =
            MemorySemanticsGate.check(&proposal("Rebuild index", Reversibility::Reversible, ctx));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].is_fatal());
        assert_eq!(violations[0].context["after"], serde_json::json!(40));
    }

    #[test]
    fn test_transparency_levels() {
        let outcome_only = ProposalContext::new("ctx").with_logging(false, true);
        let v = ProcessTransparencyGate.check(&proposal("Run job", Reversibility::Reversible, outcome_only));
        assert_eq!(v[0].severity, Severity::Warning);

        let nothing = ProposalContext::new("ctx");
        let v = ProcessTransparencyGate.check(&proposal("Run job", Reversibility::Reversible, nothing));
        assert_eq!(v[0].severity, Severity::Critical);
    }

    #[test]
    fn test_validate_is_idempotent() {
        let validator = GateValidator::with_defaults();
        let p = proposal(
            "Delete all archives",
            Reversibility::Irreversible,
            ProposalContext::new("ctx").with_memory(5, 0),
        );
        let first = validator.validate(&p);
        let second = validator.validate(&p);
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_timeout_violation_is_fatal() {
        let v = GateViolation::evaluation_timeout("guardian", "deadline elapsed");
        assert!(v.is_fatal());
        assert_eq!(v.gate_id, GateId::EvaluationTimeout);
        assert_eq!(GateId::EvaluationTimeout.to_string(), "EVALUATION_TIMEOUT");
    }
}
