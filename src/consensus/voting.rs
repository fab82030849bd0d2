//! Votes, rounds and the aggregator.
//!
//! A veto forces `Vetoed` regardless of the approval ratio. A round with
//! missing votes is `Blocked`: absence is never counted as approval.

use crate::core::{now, Axiom, Timestamp};
use crate::proposal::ProposalId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default approval threshold.
pub const DEFAULT_APPROVAL_THRESHOLD: f64 = 0.70;

/// A single member's vote in one round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    /// Member that cast the vote
    pub member_id: String,
    /// Score in [0, 1]
    pub score: f64,
    /// Whether the member approves
    pub approved: bool,
    /// Unilateral block
    pub veto: bool,
    /// Axiom the member reasoned under
    pub axiom_invoked: Axiom,
    /// Short structured message
    pub rationale: String,
    /// Member weight at the time of voting
    pub weight: f64,
}

impl Vote {
    fn new(member_id: &str, axiom: Axiom, score: f64, approved: bool, veto: bool, rationale: &str) -> Self {
        Self {
            member_id: member_id.to_string(),
            score: score.clamp(0.0, 1.0),
            approved,
            veto,
            axiom_invoked: axiom,
            rationale: rationale.to_string(),
            weight: 1.0,
        }
    }

    /// Create an approving vote.
    pub fn approve(member_id: &str, axiom: Axiom, score: f64, rationale: &str) -> Self {
        Self::new(member_id, axiom, score, true, false, rationale)
    }

    /// Create a rejecting vote.
    pub fn reject(member_id: &str, axiom: Axiom, score: f64, rationale: &str) -> Self {
        Self::new(member_id, axiom, score, false, false, rationale)
    }

    /// Create a veto.
    pub fn veto(member_id: &str, axiom: Axiom, rationale: &str) -> Self {
        Self::new(member_id, axiom, 0.0, false, true, rationale)
    }

    /// Set member weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight.max(0.0);
        self
    }
}

/// Outcome of a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Approved,
    Rejected,
    Vetoed,
    /// Governance could not complete; safety default
    Blocked,
}

impl Verdict {
    pub fn is_approved(&self) -> bool {
        matches!(self, Verdict::Approved)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Approved => write!(f, "APPROVED"),
            Verdict::Rejected => write!(f, "REJECTED"),
            Verdict::Vetoed => write!(f, "VETOED"),
            Verdict::Blocked => write!(f, "BLOCKED"),
        }
    }
}

/// A member that did not deliver a vote.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MissingVote {
    pub member_id: String,
    pub reason: String,
}

/// One voting round over one proposal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VotingRound {
    /// Round number (1-indexed)
    pub round_number: u32,
    /// Proposal voted on
    pub proposal_ref: ProposalId,
    /// Votes in member registration order
    pub votes: Vec<Vote>,
    /// Members that timed out or failed
    pub missing: Vec<MissingVote>,
    /// approved / total
    pub approval_ratio: f64,
    /// Weight-adjusted approval
    pub weighted_approval: f64,
    /// Whether any member vetoed
    pub veto_exercised: bool,
    /// Round outcome
    pub verdict: Verdict,
    /// When the round closed
    pub closed_at: Timestamp,
}

impl VotingRound {
    /// Number of approving votes.
    pub fn approved_count(&self) -> usize {
        self.votes.iter().filter(|v| v.approved).count()
    }

    /// Members expected in this round.
    pub fn total_members(&self) -> usize {
        self.votes.len() + self.missing.len()
    }

    /// Vote split as "approved/total".
    pub fn vote_split(&self) -> String {
        format!("{}/{}", self.approved_count(), self.total_members())
    }

    /// Vetoing votes.
    pub fn vetoes(&self) -> impl Iterator<Item = &Vote> {
        self.votes.iter().filter(|v| v.veto)
    }
}

/// Reduces member votes into a verdict.
#[derive(Clone, Debug)]
pub struct Aggregator {
    threshold: f64,
    axiom_weights: HashMap<Axiom, f64>,
}

impl Aggregator {
    /// Create an aggregator with the given approval threshold.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
            axiom_weights: HashMap::new(),
        }
    }

    /// Set per-axiom weights. Axioms not listed weigh 1.0.
    pub fn with_axiom_weights(mut self, weights: HashMap<Axiom, f64>) -> Self {
        self.axiom_weights = weights;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn effective_weight(&self, vote: &Vote) -> f64 {
        vote.weight * self.axiom_weights.get(&vote.axiom_invoked).copied().unwrap_or(1.0)
    }

    /// Tally a round.
    pub fn tally(
        &self,
        round_number: u32,
        proposal_ref: &ProposalId,
        votes: Vec<Vote>,
        missing: Vec<MissingVote>,
    ) -> VotingRound {
        let total = votes.len() + missing.len();
        let approved = votes.iter().filter(|v| v.approved).count();
        let approval_ratio = if total == 0 {
            0.0
        } else {
            approved as f64 / total as f64
        };

        let total_weight: f64 = votes.iter().map(|v| self.effective_weight(v)).sum();
        let approved_weight: f64 = votes
            .iter()
            .filter(|v| v.approved)
            .map(|v| self.effective_weight(v))
            .sum();
        let weighted_approval = if total_weight > 0.0 && missing.is_empty() {
            approved_weight / total_weight
        } else {
            0.0
        };

        let veto_exercised = votes.iter().any(|v| v.veto);
        let verdict = if veto_exercised {
            Verdict::Vetoed
        } else if total == 0 || !missing.is_empty() {
            Verdict::Blocked
        } else if approval_ratio >= self.threshold {
            Verdict::Approved
        } else {
            Verdict::Rejected
        };

        VotingRound {
            round_number,
            proposal_ref: proposal_ref.clone(),
            votes,
            missing,
            approval_ratio,
            weighted_approval,
            veto_exercised,
            verdict,
            closed_at: now(),
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(DEFAULT_APPROVAL_THRESHOLD)
    }
}
