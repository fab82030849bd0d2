//! Conflict detection between opposing axioms in a failed round.

use crate::consensus::voting::{Verdict, VotingRound};
use crate::core::Axiom;
use serde::{Deserialize, Serialize};

/// An axiom that blocked the round against one that strongly favoured it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AxisPair {
    pub opposed: Axiom,
    pub favoured: Axiom,
}

/// Result of scanning a round for axiom-vs-axiom tension.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub detected: bool,
    pub axis_pairs: Vec<AxisPair>,
}

impl ConflictReport {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Finds genuine tension: a strong "no" under one axiom facing a strong
/// "yes" under another. Uniform or mild rejection is not a conflict.
#[derive(Clone, Debug)]
pub struct ConflictDetector {
    strong_approval: f64,
    strong_disapproval: f64,
}

impl ConflictDetector {
    pub fn new(strong_approval: f64, strong_disapproval: f64) -> Self {
        Self {
            strong_approval,
            strong_disapproval,
        }
    }

    /// Scan a round. Approved and blocked rounds never conflict.
    pub fn detect(&self, round: &VotingRound) -> ConflictReport {
        if matches!(round.verdict, Verdict::Approved | Verdict::Blocked) {
            return ConflictReport::none();
        }

        let against = round
            .votes
            .iter()
            .filter(|v| v.veto || (!v.approved && v.score <= self.strong_disapproval));
        let mut pairs: Vec<AxisPair> = Vec::new();

        for no in against {
            for yes in round
                .votes
                .iter()
                .filter(|v| v.approved && v.score >= self.strong_approval)
            {
                if no.axiom_invoked == yes.axiom_invoked {
                    continue;
                }
                let pair = AxisPair {
                    opposed: no.axiom_invoked.clone(),
                    favoured: yes.axiom_invoked.clone(),
                };
                if !pairs.contains(&pair) {
                    pairs.push(pair);
                }
            }
        }

        ConflictReport {
            detected: !pairs.is_empty(),
            axis_pairs: pairs,
        }
    }
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::new(0.8, 0.2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::voting::{Aggregator, Vote};
    use crate::proposal::ProposalId;

    fn round(votes: Vec<Vote>) -> VotingRound {
        Aggregator::default().tally(1, &ProposalId::new("p"), votes, Vec::new())
    }

    #[test]
    fn test_veto_against_strong_approval() {
        let r = round(vec![
            Vote::veto("guardian", Axiom::Preservation, "destroys memory"),
            Vote::approve("optimizer", Axiom::Efficiency, 0.9, "faster"),
            Vote::approve("witness", Axiom::Transparency, 0.6, "fine"),
        ]);
        let report = ConflictDetector::default().detect(&r);

        assert!(report.detected);
        assert_eq!(
            report.axis_pairs,
            vec![AxisPair {
                opposed: Axiom::Preservation,
                favoured: Axiom::Efficiency
            }]
        );
    }

    #[test]
    fn test_mild_rejection_is_not_conflict() {
        let r = round(vec![
            Vote::reject("a", Axiom::Safety, 0.4, "unsure"),
            Vote::reject("b", Axiom::Preservation, 0.45, "unsure"),
            Vote::approve("c", Axiom::Efficiency, 0.9, "fast"),
        ]);
        assert_eq!(r.verdict, Verdict::Rejected);
        assert!(!ConflictDetector::default().detect(&r).detected);
    }

    #[test]
    fn test_same_axiom_is_not_conflict() {
        let r = round(vec![
            Vote::veto("a", Axiom::Safety, "no"),
            Vote::approve("b", Axiom::Safety, 0.95, "yes"),
        ]);
        assert!(!ConflictDetector::default().detect(&r).detected);
    }

    #[test]
    fn test_approved_round_has_no_conflict() {
        let r = round(vec![
            Vote::approve("a", Axiom::Safety, 0.9, "ok"),
            Vote::approve("b", Axiom::Efficiency, 0.9, "ok"),
        ]);
        assert_eq!(ConflictDetector::default().detect(&r), ConflictReport::none());
    }

    #[test]
    fn test_pairs_deduplicated() {
        let r = round(vec![
            Vote::veto("a", Axiom::Preservation, "no"),
            Vote::reject("b", Axiom::Preservation, 0.1, "no"),
            Vote::approve("c", Axiom::Efficiency, 0.9, "yes"),
        ]);
        assert_eq!(ConflictDetector::default().detect(&r).axis_pairs.len(), 1);
    }
}
