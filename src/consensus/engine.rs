//! Deliberation engine: the bounded vote / conflict / synthesis loop.
//!
//! Rounds are strictly sequential. The original proposal is voted first;
//! while a round fails with a detectable axiom conflict and a template fits,
//! a compromise is derived, re-gated and voted as the next round, up to the
//! configured synthesis cap.

use crate::consensus::conflict::ConflictDetector;
use crate::consensus::gates::{has_fatal, GateValidator, GateViolation};
use crate::consensus::member::Ballot;
use crate::consensus::panel::Panel;
use crate::consensus::synthesis::SynthesisGenerator;
use crate::consensus::voting::{Aggregator, Verdict, VotingRound};
use crate::proposal::{Classifier, Proposal};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Default number of synthesis rounds after the original vote.
pub const DEFAULT_MAX_SYNTHESIS_ROUNDS: u32 = 2;

/// Hard ceiling on synthesis rounds.
pub const MAX_SYNTHESIS_ROUNDS_CEILING: u32 = 8;

/// Why synthesis gave up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionReason {
    /// No template fits the conflicting axioms
    NoTemplate,
    /// Synthesis round cap reached
    RoundCap,
}

/// How a decision ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    Approved,
    /// Failed round without a strong axiom conflict
    NoConflict,
    SynthesisExhausted { reason: ExhaustionReason },
    /// Fatal gate violation before any voting
    GateAborted,
    /// Fatal gate violation on a synthesized proposal
    SynthesisGateAborted,
    /// Missing votes or no reachable governance path
    Blocked,
    Cancelled,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::Approved => write!(f, "approved"),
            Termination::NoConflict => write!(f, "rejected without axiom conflict"),
            Termination::SynthesisExhausted { reason } => match reason {
                ExhaustionReason::NoTemplate => write!(f, "synthesis exhausted: no template"),
                ExhaustionReason::RoundCap => write!(f, "synthesis exhausted: round cap"),
            },
            Termination::GateAborted => write!(f, "aborted by fatal gate violation"),
            Termination::SynthesisGateAborted => {
                write!(f, "synthesized proposal aborted by fatal gate violation")
            }
            Termination::Blocked => write!(f, "blocked"),
            Termination::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Loop settings.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Synthesis rounds allowed after the first vote
    pub max_synthesis_rounds: u32,
    /// Deadline for each round
    pub round_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_synthesis_rounds: DEFAULT_MAX_SYNTHESIS_ROUNDS,
            round_timeout: Duration::from_millis(5_000),
        }
    }
}

/// Outcome of the loop for one proposal.
#[derive(Clone, Debug)]
pub struct Deliberation {
    pub rounds: Vec<VotingRound>,
    /// Violations raised during the loop: missing members and gate results
    /// on synthesized proposals
    pub violations: Vec<GateViolation>,
    /// Every compromise generated, including one rejected by the gates
    pub synthesized: Vec<Proposal>,
    pub termination: Termination,
}

impl Deliberation {
    /// Verdict of the last round; `Blocked` when no round ran.
    pub fn final_verdict(&self) -> Verdict {
        self.rounds
            .last()
            .map(|round| round.verdict)
            .unwrap_or(Verdict::Blocked)
    }

    /// True iff the approved proposal is a synthesized compromise. An
    /// exhausted or interrupted synthesis reverts to the last real verdict.
    pub fn synthesis_applied(&self) -> bool {
        self.termination == Termination::Approved && self.rounds.len() > 1
    }

    /// Number of rounds that voted on a synthesized proposal.
    pub fn synthesis_rounds(&self) -> usize {
        self.rounds.len().saturating_sub(1)
    }

    pub fn last_round(&self) -> Option<&VotingRound> {
        self.rounds.last()
    }
}

/// Runs the round loop over a chosen panel.
pub struct DeliberationEngine<'a> {
    classifier: &'a dyn Classifier,
    gates: &'a GateValidator,
    aggregator: &'a Aggregator,
    synthesizer: &'a SynthesisGenerator,
    detector: ConflictDetector,
    config: EngineConfig,
}

impl<'a> DeliberationEngine<'a> {
    /// Create an engine over borrowed session components.
    pub fn new(
        classifier: &'a dyn Classifier,
        gates: &'a GateValidator,
        aggregator: &'a Aggregator,
        synthesizer: &'a SynthesisGenerator,
        mut config: EngineConfig,
    ) -> Self {
        config.max_synthesis_rounds = config.max_synthesis_rounds.min(MAX_SYNTHESIS_ROUNDS_CEILING);
        Self {
            classifier,
            gates,
            aggregator,
            synthesizer,
            detector: ConflictDetector::default(),
            config,
        }
    }

    pub fn with_detector(mut self, detector: ConflictDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Deliberate on a proposal that already passed the gates.
    ///
    /// Cancellation is observed before each round only; a round that has
    /// started always completes.
    pub async fn deliberate(
        &self,
        panel: &Panel,
        proposal: Proposal,
        cancel: &CancellationToken,
    ) -> Deliberation {
        let mut current = proposal;
        let mut rounds: Vec<VotingRound> = Vec::new();
        let mut violations: Vec<GateViolation> = Vec::new();
        let mut synthesized: Vec<Proposal> = Vec::new();
        let mut round_number: u32 = 1;

        let termination = loop {
            if cancel.is_cancelled() {
                info!(round = round_number, "deliberation cancelled");
                break Termination::Cancelled;
            }

            let axioms = self.classifier.classify(&current.text());
            debug!(round = round_number, ?axioms, "ballot classified");
            let ballot = Ballot::new(current.clone(), axioms, round_number);
            let round = panel
                .convene(ballot, self.aggregator, self.config.round_timeout)
                .await;

            violations.extend(
                round
                    .missing
                    .iter()
                    .map(|m| GateViolation::evaluation_timeout(&m.member_id, &m.reason)),
            );
            let verdict = round.verdict;
            let conflict = self.detector.detect(&round);
            rounds.push(round);

            match verdict {
                Verdict::Approved => break Termination::Approved,
                Verdict::Blocked => break Termination::Blocked,
                Verdict::Rejected | Verdict::Vetoed => {}
            }

            if !conflict.detected {
                break Termination::NoConflict;
            }
            if round_number > self.config.max_synthesis_rounds {
                info!(round = round_number, "synthesis round cap reached");
                break Termination::SynthesisExhausted {
                    reason: ExhaustionReason::RoundCap,
                };
            }

            let next = match self
                .synthesizer
                .synthesize(&current, &conflict, round_number)
            {
                Some(next) => next,
                None => {
                    info!(round = round_number, "no synthesis template fits");
                    break Termination::SynthesisExhausted {
                        reason: ExhaustionReason::NoTemplate,
                    };
                }
            };

            let next_violations: Vec<GateViolation> = self
                .gates
                .validate(&next)
                .into_iter()
                .map(|v| v.with_context("proposal_id", next.id().as_str()))
                .collect();
            let fatal = has_fatal(&next_violations);
            violations.extend(next_violations);

            info!(
                round = round_number,
                action = next.action(),
                fatal,
                "synthesized compromise"
            );
            synthesized.push(next.clone());
            if fatal {
                break Termination::SynthesisGateAborted;
            }

            current = next;
            round_number += 1;
        };

        Deliberation {
            rounds,
            violations,
            synthesized,
            termination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::gates::GateId;
    use crate::consensus::member::{MemberRegistry, VotingMember};
    use crate::consensus::synthesis::{Rewrite, SynthesisTemplate};
    use crate::consensus::voting::Vote;
    use crate::core::{Axiom, Result};
    use crate::proposal::{Criticality, KeywordClassifier, ProposalContext, Reversibility};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Fixed {
        id: &'static str,
        vote: Vote,
    }

    #[async_trait]
    impl VotingMember for Fixed {
        fn id(&self) -> &str {
            self.id
        }

        fn affinities(&self) -> &[Axiom] {
            &[]
        }

        async fn evaluate(&self, _ballot: &Ballot) -> Result<Vote> {
            Ok(self.vote.clone())
        }
    }

    fn fixed(id: &'static str, vote: Vote) -> Arc<dyn VotingMember> {
        Arc::new(Fixed { id, vote })
    }

    fn deadlock_panel() -> Panel {
        let registry = MemberRegistry::from_members(vec![
            fixed("keeper", Vote::veto("keeper", Axiom::Preservation, "never")),
            fixed("runner", Vote::approve("runner", Axiom::Efficiency, 0.95, "always")),
        ])
        .unwrap();
        Panel::council(&registry)
    }

    fn logs_proposal() -> Proposal {
        Proposal::new(
            "Delete old logs to speed up the system",
            "reclaim disk space",
            Reversibility::Moderate,
            Criticality::Important,
            ProposalContext::new("ctx-logs")
                .with_source("ops")
                .with_target("log-store")
                .with_logging(false, true),
        )
        .unwrap()
    }

    struct Fixture {
        classifier: KeywordClassifier,
        gates: GateValidator,
        aggregator: Aggregator,
        synthesizer: SynthesisGenerator,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                classifier: KeywordClassifier::with_defaults(),
                gates: GateValidator::with_defaults(),
                aggregator: Aggregator::default(),
                synthesizer: SynthesisGenerator::with_defaults(),
            }
        }

        fn with_synthesizer(mut self, synthesizer: SynthesisGenerator) -> Self {
            self.synthesizer = synthesizer;
            self
        }

        fn engine(&self, max_synthesis_rounds: u32) -> DeliberationEngine<'_> {
            DeliberationEngine::new(
                &self.classifier,
                &self.gates,
                &self.aggregator,
                &self.synthesizer,
                EngineConfig {
                    max_synthesis_rounds,
                    round_timeout: Duration::from_secs(2),
                },
            )
        }
    }

    #[tokio::test]
    async fn test_synthesis_resolves_conflict() {
        let fixture = Fixture::new();
        let panel = Panel::council(&MemberRegistry::with_defaults());
        let result = fixture
            .engine(2)
            .deliberate(&panel, logs_proposal(), &CancellationToken::new())
            .await;

        assert_eq!(result.termination, Termination::Approved);
        assert_eq!(result.rounds.len(), 2);
        assert!(result.synthesis_applied());
        assert_eq!(result.rounds[0].verdict, Verdict::Vetoed);
        assert_eq!(result.rounds[1].round_number, 2);
        assert_eq!(result.final_verdict(), Verdict::Approved);
        assert!(result.synthesized[0].action().starts_with("Compress and archive"));
        assert_eq!(result.rounds[1].proposal_ref, *result.synthesized[0].id());
    }

    #[tokio::test]
    async fn test_round_cap_bounds_rounds() {
        let mut synthesizer = SynthesisGenerator::new();
        synthesizer.add_template(SynthesisTemplate::new(
            "restate",
            Axiom::Preservation,
            Axiom::Efficiency,
            Rewrite::Keep,
        ));
        let fixture = Fixture::new().with_synthesizer(synthesizer);
        let panel = deadlock_panel();

        for cap in [0u32, 1, 2, 3] {
            let result = fixture
                .engine(cap)
                .deliberate(&panel, logs_proposal(), &CancellationToken::new())
                .await;
            assert_eq!(result.rounds.len() as u32, 1 + cap);
            assert_eq!(
                result.termination,
                Termination::SynthesisExhausted {
                    reason: ExhaustionReason::RoundCap
                }
            );
            assert!(!result.synthesis_applied());
            assert_eq!(result.synthesis_rounds() as u32, cap);
            assert_eq!(result.final_verdict(), Verdict::Vetoed);
        }
    }

    #[tokio::test]
    async fn test_cap_is_clamped_to_ceiling() {
        let mut synthesizer = SynthesisGenerator::new();
        synthesizer.add_template(SynthesisTemplate::new(
            "restate",
            Axiom::Preservation,
            Axiom::Efficiency,
            Rewrite::Keep,
        ));
        let fixture = Fixture::new().with_synthesizer(synthesizer);
        let result = fixture
            .engine(100)
            .deliberate(&deadlock_panel(), logs_proposal(), &CancellationToken::new())
            .await;
        assert_eq!(result.rounds.len() as u32, 1 + MAX_SYNTHESIS_ROUNDS_CEILING);
    }

    #[tokio::test]
    async fn test_no_template_exhausts() {
        let registry = MemberRegistry::from_members(vec![
            fixed("a", Vote::veto("a", Axiom::Safety, "unsafe")),
            fixed("b", Vote::approve("b", Axiom::Autonomy, 0.9, "free")),
        ])
        .unwrap();
        let fixture = Fixture::new();
        let result = fixture
            .engine(2)
            .deliberate(&Panel::council(&registry), logs_proposal(), &CancellationToken::new())
            .await;

        assert_eq!(result.rounds.len(), 1);
        assert!(!result.synthesis_applied());
        assert_eq!(
            result.termination,
            Termination::SynthesisExhausted {
                reason: ExhaustionReason::NoTemplate
            }
        );
        assert_eq!(result.final_verdict(), Verdict::Vetoed);
    }

    #[tokio::test]
    async fn test_mild_rejection_has_no_conflict() {
        let registry = MemberRegistry::from_members(vec![
            fixed("a", Vote::reject("a", Axiom::Safety, 0.4, "unsure")),
            fixed("b", Vote::approve("b", Axiom::Efficiency, 0.6, "fine")),
        ])
        .unwrap();
        let fixture = Fixture::new();
        let result = fixture
            .engine(2)
            .deliberate(&Panel::council(&registry), logs_proposal(), &CancellationToken::new())
            .await;
        assert_eq!(result.termination, Termination::NoConflict);
        assert_eq!(result.final_verdict(), Verdict::Rejected);
    }

    #[tokio::test]
    async fn test_fatal_gate_on_synthesized_proposal() {
        let mut synthesizer = SynthesisGenerator::new();
        synthesizer.add_template(
            SynthesisTemplate::new("harden", Axiom::Preservation, Axiom::Efficiency, Rewrite::Keep)
                .with_reversibility(Reversibility::Irreversible),
        );
        let fixture = Fixture::new().with_synthesizer(synthesizer);
        let result = fixture
            .engine(2)
            .deliberate(&deadlock_panel(), logs_proposal(), &CancellationToken::new())
            .await;

        assert_eq!(result.termination, Termination::SynthesisGateAborted);
        assert_eq!(result.rounds.len(), 1);
        assert!(!result.synthesis_applied());
        assert_eq!(result.synthesized.len(), 1);
        assert!(result
            .violations
            .iter()
            .any(|v| v.gate_id == GateId::MemorySemantics && v.is_fatal()));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_round() {
        let fixture = Fixture::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = fixture
            .engine(2)
            .deliberate(&deadlock_panel(), logs_proposal(), &cancel)
            .await;
        assert_eq!(result.termination, Termination::Cancelled);
        assert!(result.rounds.is_empty());
        assert_eq!(result.final_verdict(), Verdict::Blocked);
    }

    #[test]
    fn test_termination_serialization() {
        let t = Termination::SynthesisExhausted {
            reason: ExhaustionReason::RoundCap,
        };
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, r#"{"kind":"synthesis_exhausted","reason":"round_cap"}"#);
        let back: Termination = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
