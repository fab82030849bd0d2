//! End-to-end governance scenarios through `GovernanceSession`.

use async_trait::async_trait;
use ethos_governor::consensus::{
    Ballot, ExhaustionReason, GateId, GateValidator, GovernanceMode, MemberRegistry, Panel,
    Rewrite, SynthesisGenerator, SynthesisTemplate, Termination, Verdict, Vote, VotingMember,
};
use ethos_governor::core::{Axiom, Result};
use ethos_governor::fork::ForkTracker;
use ethos_governor::proposal::{
    Criticality, Proposal, ProposalContext, ProposalOrigin, Reversibility,
};
use ethos_governor::{EvaluationRequest, GovernanceConfig, GovernanceSession};
use std::sync::Arc;

struct Fixed {
    id: &'static str,
    vote: Vote,
    online: bool,
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

    async fn is_available(&self) -> bool {
        self.online
    }
}

fn member(id: &'static str, vote: Vote) -> Arc<dyn VotingMember> {
    Arc::new(Fixed {
        id,
        vote,
        online: true,
    })
}

fn offline(id: &'static str) -> Arc<dyn VotingMember> {
    Arc::new(Fixed {
        id,
        vote: Vote::approve(id, Axiom::Safety, 1.0, "unreachable anyway"),
        online: false,
    })
}

fn council(members: Vec<Arc<dyn VotingMember>>) -> Panel {
    Panel::council(&MemberRegistry::from_members(members).unwrap())
}

fn context(id: &str) -> ProposalContext {
    ProposalContext::new(id)
        .with_source("operator")
        .with_target("log-store")
        .with_logging(true, true)
}

fn config(instance_id: &str) -> GovernanceConfig {
    GovernanceConfig {
        instance_id: instance_id.to_string(),
        ..Default::default()
    }
}

async fn default_session() -> GovernanceSession {
    GovernanceSession::new(config("node-a")).await.unwrap()
}

#[tokio::test]
async fn shrinking_memory_aborts_before_voting() {
    let session = default_session().await;
    let request = EvaluationRequest::new(
        "Compact the event store",
        context("ctx-shrink").with_memory(10_000, 4_000),
    );

    let result = session.evaluate(request).await.unwrap();
    assert!(!result.approved);
    assert!(result.rounds.is_empty());
    assert_eq!(result.termination, Termination::GateAborted);
    assert!(result
        .gate_violations
        .iter()
        .any(|v| v.gate_id == GateId::MemorySemantics && v.is_fatal()));
}

#[tokio::test]
async fn veto_overrides_weighted_approval() {
    let panel = council(vec![
        member("a", Vote::approve("a", Axiom::Autonomy, 0.95, "free choice")),
        member("b", Vote::approve("b", Axiom::Autonomy, 0.95, "free choice")),
        member("c", Vote::approve("c", Axiom::Autonomy, 0.95, "free choice")),
        member("d", Vote::approve("d", Axiom::Autonomy, 0.95, "free choice")),
        member("e", Vote::veto("e", Axiom::Safety, "unsafe at any ratio")),
    ]);
    let arbiter = Panel::arbiter(member("arb", Vote::approve("arb", Axiom::Safety, 1.0, "fine")));
    let session = GovernanceSession::builder(config("node-a"))
        .with_panels(arbiter, panel)
        .build()
        .await
        .unwrap();

    let result = session
        .evaluate(
            EvaluationRequest::new("Restart the scheduler", context("ctx-veto"))
                .with_criticality(Criticality::Important),
        )
        .await
        .unwrap();

    assert!(!result.approved);
    assert_eq!(result.rounds[0].verdict, Verdict::Vetoed);
    assert!(result.weighted_approval >= 0.8);
    assert_eq!(result.vote_split, "4/5");
    assert!(result.rationale.contains("vetoed by e"));
    // safety vs autonomy has no template
    assert_eq!(
        result.termination,
        Termination::SynthesisExhausted {
            reason: ExhaustionReason::NoTemplate
        }
    );
}

#[test]
fn gate_validation_is_idempotent() {
    let gates = GateValidator::with_defaults();
    let proposal = Proposal::new(
        "Delete all archives",
        "",
        Reversibility::Irreversible,
        Criticality::Normal,
        ProposalContext::new("ctx-idem").with_source("ops").with_target("ops"),
    )
    .unwrap();

    let first = gates.validate(&proposal);
    let second = gates.validate(&proposal);
    assert_eq!(first, second);
    assert!(!first.is_empty());
}

#[tokio::test]
async fn repeated_conflict_is_bounded() {
    let mut synthesizer = SynthesisGenerator::new();
    synthesizer.add_template(SynthesisTemplate::new(
        "restate",
        Axiom::Preservation,
        Axiom::Efficiency,
        Rewrite::Keep,
    ));
    let deadlock = council(vec![
        member("keeper", Vote::veto("keeper", Axiom::Preservation, "never")),
        member("runner", Vote::approve("runner", Axiom::Efficiency, 0.95, "always")),
    ]);
    let arbiter = Panel::arbiter(member("arb", Vote::approve("arb", Axiom::Safety, 1.0, "fine")));

    for cap in [0u32, 1, 2, 4] {
        let session = GovernanceSession::builder(GovernanceConfig {
            max_synthesis_rounds: cap,
            ..config("node-a")
        })
        .with_panels(arbiter.clone(), deadlock.clone())
        .with_synthesizer(synthesizer.clone())
        .build()
        .await
        .unwrap();

        let result = session
            .evaluate(
                EvaluationRequest::new("Delete old logs to speed up the system", context("ctx-cap"))
                    .with_reversibility(Reversibility::Moderate)
                    .with_criticality(Criticality::Critical),
            )
            .await
            .unwrap();

        assert!(result.rounds.len() as u32 <= 1 + cap);
        assert_eq!(result.rounds.len() as u32, 1 + cap);
        assert!(!result.approved);
        assert!(!result.synthesis_applied);
        assert_eq!(
            result.termination,
            Termination::SynthesisExhausted {
                reason: ExhaustionReason::RoundCap
            }
        );
    }
}

#[tokio::test]
async fn irreversible_archive_deletion_is_fatal() {
    let session = default_session().await;
    let result = session
        .evaluate(
            EvaluationRequest::new("Delete all archives", context("ctx-archives"))
                .with_reversibility(Reversibility::Irreversible)
                .with_criticality(Criticality::Critical),
        )
        .await
        .unwrap();

    assert!(!result.approved);
    assert!(result.rounds.is_empty());
    assert!(result
        .gate_violations
        .iter()
        .any(|v| v.gate_id == GateId::MemorySemantics && v.is_fatal()));

    let records = session.list_decisions(None).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].final_verdict, Verdict::Blocked);
}

#[tokio::test]
async fn routine_status_log_goes_to_arbiter() {
    let session = default_session().await;
    let result = session
        .evaluate(
            EvaluationRequest::new("Log system status", context("ctx-status"))
                .with_reversibility(Reversibility::Reversible)
                .with_criticality(Criticality::Routine),
        )
        .await
        .unwrap();

    assert!(result.approved);
    assert_eq!(result.governance_mode, GovernanceMode::Arbiter);
    assert_eq!(result.rounds.len(), 1);
    assert_eq!(result.vote_split, "1/1");
    assert_eq!(result.termination, Termination::Approved);
    assert!(!result.synthesis_applied);
}

#[tokio::test]
async fn deleting_logs_is_synthesized_into_archiving() {
    let session = default_session().await;
    let result = session
        .evaluate(
            EvaluationRequest::new(
                "Delete old logs to speed up the system",
                ProposalContext::new("ctx-logs")
                    .with_source("ops")
                    .with_target("log-store")
                    .with_logging(false, true),
            )
            .with_intent("reclaim disk space")
            .with_reversibility(Reversibility::Moderate)
            .with_criticality(Criticality::Important),
        )
        .await
        .unwrap();

    assert!(result.approved);
    assert!(result.synthesis_applied);
    assert_eq!(result.governance_mode, GovernanceMode::Council);
    assert_eq!(result.rounds.len(), 2);

    let first = &result.rounds[0];
    assert_eq!(first.verdict, Verdict::Vetoed);
    assert!(first
        .vetoes()
        .any(|v| v.axiom_invoked == Axiom::Preservation));
    assert!(first
        .votes
        .iter()
        .any(|v| v.axiom_invoked == Axiom::Efficiency && v.approved && v.score >= 0.8));
    assert_eq!(result.rounds[1].verdict, Verdict::Approved);

    let record = session
        .ledger()
        .read(&result.record_id)
        .await
        .unwrap()
        .unwrap();
    let compromise = &record.synthesized[0];
    assert!(compromise.action().starts_with("Compress and archive"));
    assert_eq!(result.rounds[1].proposal_ref, *compromise.id());
    match compromise.origin() {
        ProposalOrigin::Synthesis(origin) => {
            assert_eq!(origin.parent_id, *record.proposal.id());
        }
        ProposalOrigin::Submitted => panic!("compromise must record its parent"),
    }
    // the submitted proposal is untouched
    assert_eq!(record.proposal.action(), "Delete old logs to speed up the system");
}

#[tokio::test]
async fn opposite_verdicts_across_instances_fork() {
    let tracker = Arc::new(ForkTracker::in_memory());

    let approving = GovernanceSession::builder(config("node-a"))
        .with_fork_tracker(Arc::clone(&tracker))
        .build()
        .await
        .unwrap();
    let rejecting = GovernanceSession::builder(config("node-b"))
        .with_panels(
            Panel::arbiter(member(
                "skeptic",
                Vote::reject("skeptic", Axiom::Transparency, 0.5, "not convinced"),
            )),
            council(vec![member(
                "skeptic",
                Vote::reject("skeptic", Axiom::Transparency, 0.5, "not convinced"),
            )]),
        )
        .with_fork_tracker(Arc::clone(&tracker))
        .build()
        .await
        .unwrap();

    let request = EvaluationRequest::new("Log system status", context("ctx-shared"))
        .with_criticality(Criticality::Routine);
    let a = approving.evaluate(request.clone()).await.unwrap();
    let b = rejecting.evaluate(request).await.unwrap();
    assert!(a.approved);
    assert!(!b.approved);

    let lineage = tracker.lineage_for_context("ctx-shared").await.unwrap();
    assert_eq!(lineage.competing_decisions().len(), 2);
    assert!(lineage.contains(&a.record_id));
    assert!(lineage.contains(&b.record_id));

    // an explicit comparison finds the same lineage
    let record_a = approving.ledger().read(&a.record_id).await.unwrap().unwrap();
    let record_b = rejecting.ledger().read(&b.record_id).await.unwrap().unwrap();
    let detected = tracker.detect_fork(&record_a, &record_b).await.unwrap();
    assert_eq!(detected.as_ref(), Some(lineage.lineage_id()));

    // acknowledging changes neither verdict nor membership
    tracker
        .acknowledge_fork(lineage.lineage_id(), "node-a", "aware of node-b")
        .await
        .unwrap();
    let after = tracker.lineage(lineage.lineage_id()).await.unwrap();
    assert_eq!(after.competing_decisions(), lineage.competing_decisions());
    assert!(after.is_acknowledged_by("node-a"));
    assert!(
        approving
            .ledger()
            .read(&a.record_id)
            .await
            .unwrap()
            .unwrap()
            .approved()
    );
}

#[tokio::test]
async fn detect_fork_on_independent_records_opens_lineage() {
    let strict = default_session().await;
    let lenient = GovernanceSession::new(GovernanceConfig {
        approval_threshold: 0.55,
        ..config("node-b")
    })
    .await
    .unwrap();

    // preservation and safety reject, the other three approve
    let request = EvaluationRequest::new("Restart the scheduler", context("ctx-restart"))
        .with_reversibility(Reversibility::Irreversible)
        .with_criticality(Criticality::Important);
    let a = strict.evaluate(request.clone()).await.unwrap();
    let b = lenient.evaluate(request).await.unwrap();
    assert!(!a.approved);
    assert!(b.approved);
    assert_eq!(a.vote_split, "3/5");

    let record_a = strict.list_decisions(None).await.unwrap().remove(0);
    let record_b = lenient.list_decisions(None).await.unwrap().remove(0);

    let tracker = ForkTracker::in_memory();
    let lineage_id = tracker
        .detect_fork(&record_a, &record_b)
        .await
        .unwrap()
        .unwrap();
    let lineage = tracker.lineage(&lineage_id).await.unwrap();
    assert_eq!(lineage.context_id(), "ctx-restart");
    assert_eq!(lineage.competing_decisions().len(), 2);
    assert_eq!(tracker.lineages().await.len(), 1);

    // a record never forks with itself
    assert!(tracker
        .detect_fork(&record_a, &record_a)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn no_reachable_path_blocks() {
    let session = GovernanceSession::builder(config("node-a"))
        .with_panels(
            Panel::arbiter(offline("arb")),
            council(vec![offline("c1"), offline("c2")]),
        )
        .build()
        .await
        .unwrap();

    for criticality in [Criticality::Routine, Criticality::Critical] {
        let result = session
            .evaluate(
                EvaluationRequest::new("Log system status", context("ctx-down"))
                    .with_criticality(criticality),
            )
            .await
            .unwrap();

        assert!(!result.approved);
        assert!(result.rounds.is_empty());
        assert_eq!(result.termination, Termination::Blocked);
        assert!(result
            .gate_violations
            .iter()
            .any(|v| v.gate_id == GateId::GovernanceUnavailable && v.is_fatal()));
    }

    let records = session.list_decisions(None).await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.final_verdict == Verdict::Blocked));
}

#[tokio::test]
async fn unavailable_council_falls_back_to_arbiter() {
    let session = GovernanceSession::builder(config("node-a"))
        .with_panels(
            Panel::arbiter(member("arb", Vote::approve("arb", Axiom::Safety, 0.9, "fine"))),
            council(vec![offline("c1")]),
        )
        .build()
        .await
        .unwrap();

    let result = session
        .evaluate(
            EvaluationRequest::new("Log system status", context("ctx-fallback"))
                .with_criticality(Criticality::Critical),
        )
        .await
        .unwrap();

    assert!(result.approved);
    assert_eq!(result.governance_mode, GovernanceMode::Arbiter);
    assert_eq!(session.metrics().fallbacks, 1);
}

#[tokio::test]
async fn unavailable_arbiter_escalates_to_council() {
    let session = GovernanceSession::builder(config("node-a"))
        .with_panels(
            Panel::arbiter(offline("arb")),
            council(vec![member(
                "c1",
                Vote::reject("c1", Axiom::Safety, 0.4, "not without review"),
            )]),
        )
        .build()
        .await
        .unwrap();

    let result = session
        .evaluate(
            EvaluationRequest::new("Log system status", context("ctx-escalate"))
                .with_criticality(Criticality::Routine),
        )
        .await
        .unwrap();

    assert!(!result.approved);
    assert_eq!(result.governance_mode, GovernanceMode::Council);
    assert_eq!(result.termination, Termination::NoConflict);
}
