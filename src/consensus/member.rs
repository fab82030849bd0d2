//! Voting members and the member registry.
//!
//! Built-in members score a ballot through a [`Stance`]: a pure function
//! of the proposal and its classified axioms. Nothing shared is read or
//! written during evaluation, so members of a round run concurrently.

use crate::consensus::voting::Vote;
use crate::core::{Axiom, Error, Result};
use crate::proposal::{Criticality, OperationKind, Proposal, Reversibility, VerbClass};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Scores at or above this approve.
pub const APPROVAL_SCORE: f64 = 0.5;

/// What a member sees when it votes.
#[derive(Clone, Debug)]
pub struct Ballot {
    pub proposal: Proposal,
    pub axioms: BTreeSet<Axiom>,
    pub round_number: u32,
}

impl Ballot {
    pub fn new(proposal: Proposal, axioms: BTreeSet<Axiom>, round_number: u32) -> Self {
        Self {
            proposal,
            axioms,
            round_number,
        }
    }

    pub fn touches(&self, axiom: &Axiom) -> bool {
        self.axioms.contains(axiom)
    }
}

/// An independent evaluator.
///
/// Remote members implement this over their transport; the panel applies
/// the round deadline, so implementations need not carry their own.
#[async_trait]
pub trait VotingMember: Send + Sync {
    /// Member ID.
    fn id(&self) -> &str;

    /// Axioms this member is biased toward.
    fn affinities(&self) -> &[Axiom];

    /// Member weight.
    fn weight(&self) -> f64 {
        1.0
    }

    /// Evaluate a ballot.
    async fn evaluate(&self, ballot: &Ballot) -> Result<Vote>;

    /// Whether the member can currently be reached.
    async fn is_available(&self) -> bool {
        true
    }
}

/// The policy lens a built-in member votes through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Preservation,
    Efficiency,
    Transparency,
    Safety,
    Autonomy,
}

/// Score, reasoning axiom and message produced by a stance.
#[derive(Clone, Debug, PartialEq)]
pub struct Assessment {
    pub score: f64,
    pub veto: bool,
    pub axiom: Axiom,
    pub rationale: &'static str,
}

impl Assessment {
    fn score(axiom: Axiom, score: f64, rationale: &'static str) -> Self {
        Self {
            score,
            veto: false,
            axiom,
            rationale,
        }
    }

    fn veto(axiom: Axiom, rationale: &'static str) -> Self {
        Self {
            score: 0.0,
            veto: true,
            axiom,
            rationale,
        }
    }

    pub fn approves(&self) -> bool {
        !self.veto && self.score >= APPROVAL_SCORE
    }

    fn into_vote(self, member_id: &str, weight: f64) -> Vote {
        let vote = if self.veto {
            Vote::veto(member_id, self.axiom, self.rationale)
        } else if self.approves() {
            Vote::approve(member_id, self.axiom, self.score, self.rationale)
        } else {
            Vote::reject(member_id, self.axiom, self.score, self.rationale)
        };
        vote.with_weight(weight)
    }
}

impl Stance {
    /// Every built-in stance, in council order.
    pub const ALL: [Stance; 5] = [
        Stance::Preservation,
        Stance::Efficiency,
        Stance::Transparency,
        Stance::Safety,
        Stance::Autonomy,
    ];

    /// The axiom a stance speaks for.
    pub fn axiom(&self) -> Axiom {
        match self {
            Stance::Preservation => Axiom::Preservation,
            Stance::Efficiency => Axiom::Efficiency,
            Stance::Transparency => Axiom::Transparency,
            Stance::Safety => Axiom::Safety,
            Stance::Autonomy => Axiom::Autonomy,
        }
    }

    /// Assess a ballot. Pure.
    pub fn assess(&self, ballot: &Ballot) -> Assessment {
        let p = &ballot.proposal;
        let axiom = self.axiom();

        match self {
            Stance::Preservation => {
                let op = OperationKind::classify(p.action());
                if op == OperationKind::Destructive {
                    Assessment::veto(axiom, "action destroys recorded memory")
                } else if p.context().memory.map(|m| m.shrinks()).unwrap_or(false) {
                    Assessment::score(axiom, 0.1, "memory footprint shrinks")
                } else if p.reversibility() == Reversibility::Irreversible {
                    Assessment::score(axiom, 0.3, "irreversible change to recorded state")
                } else if op == OperationKind::Compaction || ballot.touches(&axiom) {
                    Assessment::score(axiom, 0.9, "history is retained")
                } else {
                    Assessment::score(axiom, 0.7, "no impact on recorded memory")
                }
            }
            Stance::Efficiency => {
                if ballot.touches(&axiom) {
                    Assessment::score(axiom, 0.9, "improves resource use")
                } else {
                    Assessment::score(axiom, 0.6, "neutral on resource use")
                }
            }
            Stance::Transparency => {
                let ctx = p.context();
                if ctx.logs_process {
                    Assessment::score(axiom, 0.9, "process is logged")
                } else if ballot.touches(&axiom)
                    || OperationKind::classify(p.action()) == OperationKind::Observational
                {
                    Assessment::score(axiom, 0.75, "action is itself observable")
                } else if ctx.logs_outcome {
                    Assessment::score(axiom, 0.6, "only the outcome is logged")
                } else {
                    Assessment::score(axiom, 0.35, "leaves no process or outcome trail")
                }
            }
            Stance::Safety => match p.reversibility() {
                Reversibility::Irreversible if p.criticality() == Criticality::Critical => {
                    Assessment::veto(axiom, "irreversible action at critical scope")
                }
                Reversibility::Irreversible => {
                    Assessment::score(axiom, 0.2, "cannot be undone")
                }
                Reversibility::Moderate if ballot.touches(&axiom) => {
                    Assessment::score(axiom, 0.45, "partially reversible change to a sensitive system")
                }
                Reversibility::Moderate => Assessment::score(axiom, 0.7, "partially reversible"),
                Reversibility::Reversible => Assessment::score(axiom, 0.9, "fully reversible"),
            },
            Stance::Autonomy => {
                let text = p.text();
                if VerbClass::Coercive.is_present(&text) {
                    Assessment::veto(axiom, "overrides consent of affected parties")
                } else if text.to_ascii_lowercase().contains("opt-in")
                    || text.to_ascii_lowercase().contains("consent")
                {
                    Assessment::score(axiom, 0.9, "affected parties opt in")
                } else {
                    Assessment::score(axiom, 0.75, "no consent concerns")
                }
            }
        }
    }
}

/// A council member voting through a single stance.
#[derive(Clone, Debug)]
pub struct AxiomMember {
    id: String,
    stance: Stance,
    affinities: Vec<Axiom>,
    weight: f64,
}

impl AxiomMember {
    /// Create a member; its affinities default to the stance's axiom.
    pub fn new(id: &str, stance: Stance) -> Self {
        Self {
            id: id.to_string(),
            stance,
            affinities: vec![stance.axiom()],
            weight: 1.0,
        }
    }

    /// Set member weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight.max(0.0);
        self
    }

    /// Replace the affinity list.
    pub fn with_affinities(mut self, affinities: Vec<Axiom>) -> Self {
        if !affinities.is_empty() {
            self.affinities = affinities;
        }
        self
    }

    pub fn stance(&self) -> Stance {
        self.stance
    }
}

#[async_trait]
impl VotingMember for AxiomMember {
    fn id(&self) -> &str {
        &self.id
    }

    fn affinities(&self) -> &[Axiom] {
        &self.affinities
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn evaluate(&self, ballot: &Ballot) -> Result<Vote> {
        Ok(self.stance.assess(ballot).into_vote(&self.id, self.weight))
    }
}

/// Minimum mean score for the arbiter to approve.
const ARBITER_APPROVAL: f64 = 0.6;

/// Single arbiter for the fast path.
///
/// Looks through every stance at once: any stance veto is a veto, and the
/// verdict follows the mean score. The vote is attributed to the weakest
/// stance.
#[derive(Clone, Debug)]
pub struct ArbiterMember {
    id: String,
    affinities: Vec<Axiom>,
}

impl ArbiterMember {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            affinities: Stance::ALL.iter().map(Stance::axiom).collect(),
        }
    }

    /// Assess a ballot. Pure.
    pub fn judge(&self, ballot: &Ballot) -> Vote {
        let assessments: Vec<Assessment> = Stance::ALL.iter().map(|s| s.assess(ballot)).collect();

        if let Some(veto) = assessments.iter().find(|a| a.veto) {
            return Vote::veto(&self.id, veto.axiom.clone(), veto.rationale);
        }

        let mean = assessments.iter().map(|a| a.score).sum::<f64>() / assessments.len() as f64;
        let weakest = assessments
            .iter()
            .min_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
            .cloned()
            .unwrap_or_else(|| Assessment::score(Axiom::Safety, mean, "no assessment"));

        if mean >= ARBITER_APPROVAL {
            Vote::approve(&self.id, weakest.axiom, mean, "balanced across all axioms")
        } else {
            Vote::reject(&self.id, weakest.axiom, mean, weakest.rationale)
        }
    }
}

impl Default for ArbiterMember {
    fn default() -> Self {
        Self::new("arbiter")
    }
}

#[async_trait]
impl VotingMember for ArbiterMember {
    fn id(&self) -> &str {
        &self.id
    }

    fn affinities(&self) -> &[Axiom] {
        &self.affinities
    }

    async fn evaluate(&self, ballot: &Ballot) -> Result<Vote> {
        Ok(self.judge(ballot))
    }
}

/// Fixed, ordered set of council members.
#[derive(Clone, Default)]
pub struct MemberRegistry {
    members: Vec<Arc<dyn VotingMember>>,
}

impl MemberRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with one member per built-in stance.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for (id, stance) in [
            ("guardian", Stance::Preservation),
            ("optimizer", Stance::Efficiency),
            ("witness", Stance::Transparency),
            ("sentinel", Stance::Safety),
            ("steward", Stance::Autonomy),
        ] {
            registry.members.push(Arc::new(AxiomMember::new(id, stance)));
        }
        registry
    }

    /// Register a member. Member IDs are unique.
    pub fn register(&mut self, member: Arc<dyn VotingMember>) -> Result<()> {
        if self.members.iter().any(|m| m.id() == member.id()) {
            return Err(Error::DuplicateMember(member.id().to_string()));
        }
        self.members.push(member);
        Ok(())
    }

    /// Build from a list, rejecting duplicates.
    pub fn from_members(members: Vec<Arc<dyn VotingMember>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for member in &members {
            if !seen.insert(member.id().to_string()) {
                return Err(Error::DuplicateMember(member.id().to_string()));
            }
        }
        Ok(Self { members })
    }

    pub fn members(&self) -> &[Arc<dyn VotingMember>] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member IDs in registration order.
    pub fn ids(&self) -> Vec<String> {
        self.members.iter().map(|m| m.id().to_string()).collect()
    }
}
