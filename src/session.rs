//! Governance session: the public entry point.
//!
//! A session owns everything one governance instance needs: configuration,
//! panels, classifier, gates, synthesizer, ledger handle and counters. No
//! state is global; two sessions in one process are fully independent
//! unless they are handed the same fork tracker.

use crate::audit::{AuditLedger, DecisionRecord, RecordId};
use crate::config::GovernanceConfig;
use crate::consensus::gates::has_fatal;
use crate::consensus::{
    Aggregator, ArbiterMember, DeliberationEngine, GateValidator, GateViolation, GovernanceMode,
    Panel, Router, SynthesisGenerator, Termination, Verdict, VotingRound,
};
use crate::core::{Error, Result, Timestamp};
use crate::fork::ForkTracker;
use crate::monitoring::metrics::{DecisionMetrics, MetricsSnapshot};
use crate::proposal::{
    Classifier, Criticality, KeywordClassifier, Proposal, ProposalContext, ProposalId,
    Reversibility,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A caller's request to perform an action.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub action: String,
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub reversibility: Reversibility,
    #[serde(default)]
    pub criticality: Criticality,
    pub context: ProposalContext,
}

impl EvaluationRequest {
    pub fn new(action: &str, context: ProposalContext) -> Self {
        Self {
            action: action.to_string(),
            intent: String::new(),
            reversibility: Reversibility::default(),
            criticality: Criticality::default(),
            context,
        }
    }

    pub fn with_intent(mut self, intent: &str) -> Self {
        self.intent = intent.to_string();
        self
    }

    pub fn with_reversibility(mut self, reversibility: Reversibility) -> Self {
        self.reversibility = reversibility;
        self
    }

    pub fn with_criticality(mut self, criticality: Criticality) -> Self {
        self.criticality = criticality;
        self
    }
}

/// What the caller gets back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub record_id: RecordId,
    pub proposal_id: ProposalId,
    /// The only field a caller needs to act on
    pub approved: bool,
    pub governance_mode: GovernanceMode,
    pub rationale: String,
    pub gate_violations: Vec<GateViolation>,
    pub rounds: Vec<VotingRound>,
    pub synthesis_applied: bool,
    /// "approved/total" of the last round
    pub vote_split: String,
    pub weighted_approval: f64,
    pub termination: Termination,
}

impl DecisionResult {
    pub fn from_record(record: &DecisionRecord) -> Self {
        let last = record.last_round();
        Self {
            record_id: record.record_id.clone(),
            proposal_id: record.proposal.id().clone(),
            approved: record.approved(),
            governance_mode: record.governance_mode,
            rationale: rationale(record),
            gate_violations: record.gate_violations.clone(),
            rounds: record.rounds.clone(),
            synthesis_applied: record.synthesis_applied,
            vote_split: last
                .map(VotingRound::vote_split)
                .unwrap_or_else(|| "0/0".to_string()),
            weighted_approval: last.map(|r| r.weighted_approval).unwrap_or(0.0),
            termination: record.termination,
        }
    }
}

fn rationale(record: &DecisionRecord) -> String {
    let fatal: Vec<&str> = record
        .gate_violations
        .iter()
        .filter(|v| v.is_fatal())
        .map(|v| v.message.as_str())
        .collect();

    let Some(round) = record.last_round() else {
        if fatal.is_empty() {
            return record.termination.to_string();
        }
        return format!("{}: {}", record.termination, fatal.join("; "));
    };

    if let Some(veto) = round.vetoes().next() {
        return format!(
            "vetoed by {} ({}): {}",
            veto.member_id, veto.axiom_invoked, veto.rationale
        );
    }

    if !fatal.is_empty() {
        return format!("{}: {}", record.termination, fatal.join("; "));
    }

    format!(
        "{} in round {} ({} approved, weighted {:.2})",
        record.termination,
        round.round_number,
        round.vote_split(),
        round.weighted_approval
    )
}

/// Where panels come from.
#[derive(Clone)]
enum PanelSource {
    /// Built from `GovernanceConfig::members` and `arbiter_id`
    FromConfig,
    /// Supplied by the host
    Fixed { arbiter: Panel, council: Panel },
}

/// Everything a reload replaces, swapped as one snapshot.
struct Runtime {
    config: GovernanceConfig,
    router: Router,
    aggregator: Aggregator,
}

impl Runtime {
    fn build(config: GovernanceConfig, panels: &PanelSource) -> Result<Self> {
        config.validate()?;

        let (arbiter, council) = match panels {
            PanelSource::FromConfig => {
                let registry = config.build_registry()?;
                let arbiter = Panel::arbiter(Arc::new(ArbiterMember::new(&config.arbiter_id)));
                (arbiter, Panel::council(&registry))
            }
            PanelSource::Fixed { arbiter, council } => (arbiter.clone(), council.clone()),
        };

        Ok(Self {
            router: Router::new(arbiter, council, config.availability_timeout()),
            aggregator: config.aggregator(),
            config,
        })
    }
}

/// Builder for [`GovernanceSession`].
pub struct SessionBuilder {
    config: GovernanceConfig,
    panels: PanelSource,
    classifier: Option<Arc<dyn Classifier>>,
    gates: Option<GateValidator>,
    synthesizer: Option<SynthesisGenerator>,
    ledger: Option<AuditLedger>,
    forks: Option<Arc<ForkTracker>>,
}

impl SessionBuilder {
    /// Replace the default keyword classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Use host-supplied panels instead of the configured members.
    pub fn with_panels(mut self, arbiter: Panel, council: Panel) -> Self {
        self.panels = PanelSource::Fixed { arbiter, council };
        self
    }

    pub fn with_gates(mut self, gates: GateValidator) -> Self {
        self.gates = Some(gates);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: SynthesisGenerator) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Use an already started ledger instead of opening `config.ledger`.
    pub fn with_ledger(mut self, ledger: AuditLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Feed finalized records to a tracker, possibly shared with other
    /// sessions.
    pub fn with_fork_tracker(mut self, tracker: Arc<ForkTracker>) -> Self {
        self.forks = Some(tracker);
        self
    }

    pub async fn build(self) -> Result<GovernanceSession> {
        let runtime = Runtime::build(self.config, &self.panels)?;

        let ledger = match self.ledger {
            Some(ledger) => ledger,
            None => AuditLedger::open(&runtime.config.ledger).await?,
        };

        let forks = match (self.forks, &runtime.config.forks) {
            (Some(tracker), _) => Some(tracker),
            (None, Some(journal)) => Some(Arc::new(ForkTracker::open(journal)?)),
            (None, None) => None,
        };

        info!(
            instance = %runtime.config.instance_id,
            version = runtime.config.version,
            council = runtime.router.council().len(),
            ledger = %ledger.backend_type(),
            forks = forks.is_some(),
            "governance session started"
        );

        Ok(GovernanceSession {
            runtime: RwLock::new(Arc::new(runtime)),
            panels: self.panels,
            classifier: self
                .classifier
                .unwrap_or_else(|| Arc::new(KeywordClassifier::with_defaults()) as Arc<dyn Classifier>),
            gates: self.gates.unwrap_or_default(),
            synthesizer: self.synthesizer.unwrap_or_else(SynthesisGenerator::with_defaults),
            ledger,
            forks,
            metrics: DecisionMetrics::new(),
        })
    }
}

/// One governance instance.
pub struct GovernanceSession {
    runtime: RwLock<Arc<Runtime>>,
    panels: PanelSource,
    classifier: Arc<dyn Classifier>,
    gates: GateValidator,
    synthesizer: SynthesisGenerator,
    ledger: AuditLedger,
    forks: Option<Arc<ForkTracker>>,
    metrics: DecisionMetrics,
}

impl GovernanceSession {
    pub fn builder(config: GovernanceConfig) -> SessionBuilder {
        SessionBuilder {
            config,
            panels: PanelSource::FromConfig,
            classifier: None,
            gates: None,
            synthesizer: None,
            ledger: None,
            forks: None,
        }
    }

    /// Session with default components.
    pub async fn new(config: GovernanceConfig) -> Result<Self> {
        Self::builder(config).build().await
    }

    async fn runtime(&self) -> Arc<Runtime> {
        Arc::clone(&*self.runtime.read().await)
    }

    /// Evaluate a request through gates, routing, voting and synthesis,
    /// and record the outcome.
    ///
    /// Gate and evaluator problems come back as an unapproved result. A
    /// ledger failure is an error: an unrecorded decision is never returned.
    pub async fn evaluate(&self, request: EvaluationRequest) -> Result<DecisionResult> {
        self.evaluate_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Like [`evaluate`](Self::evaluate), stopping at the next round
    /// boundary once `cancel` fires. The partial decision is still recorded.
    pub async fn evaluate_with_cancel(
        &self,
        request: EvaluationRequest,
        cancel: &CancellationToken,
    ) -> Result<DecisionResult> {
        let runtime = self.runtime().await;
        let config = &runtime.config;

        let proposal = Proposal::new(
            &request.action,
            &request.intent,
            request.reversibility,
            request.criticality,
            request.context,
        )?;
        let violations = self.gates.validate(&proposal);

        let mut fallback = false;
        let record = if has_fatal(&violations) {
            info!(
                proposal = %proposal.id(),
                violations = violations.len(),
                "fatal gate violation, aborting before vote"
            );
            let mode = Router::requested_mode(proposal.criticality());
            DecisionRecord::new(&config.instance_id, proposal, mode, config.version)
                .with_violations(violations)
                .with_outcome(Verdict::Blocked, Termination::GateAborted)
        } else {
            let route = runtime.router.route(proposal.criticality()).await;
            match route.panel() {
                None => {
                    let requested = route.mode();
                    DecisionRecord::new(&config.instance_id, proposal, requested, config.version)
                        .with_violations(violations)
                        .with_violations(vec![GateViolation::governance_unavailable(
                            &requested.to_string(),
                        )])
                        .with_outcome(Verdict::Blocked, Termination::Blocked)
                }
                Some(panel) => {
                    fallback = route.is_fallback();
                    let engine = DeliberationEngine::new(
                        self.classifier.as_ref(),
                        &self.gates,
                        &runtime.aggregator,
                        &self.synthesizer,
                        config.engine_config(),
                    );
                    let deliberation = engine.deliberate(panel, proposal.clone(), cancel).await;
                    DecisionRecord::new(&config.instance_id, proposal, route.mode(), config.version)
                        .with_violations(violations)
                        .with_deliberation(deliberation)
                }
            }
        };

        let record = self.ledger.commit(record).await?;
        self.metrics.record(&record, fallback);
        info!(
            record = %record.record_id,
            sequence = record.sequence,
            verdict = %record.final_verdict,
            mode = %record.governance_mode,
            termination = %record.termination,
            "decision recorded"
        );

        if let Some(forks) = &self.forks {
            if let Err(e) = forks.observe(&record).await {
                warn!(record = %record.record_id, error = %e, "fork tracker rejected record");
            }
        }

        Ok(DecisionResult::from_record(&record))
    }

    /// Recorded decisions, oldest first, optionally from `since` onwards.
    pub async fn list_decisions(&self, since: Option<Timestamp>) -> Result<Vec<DecisionRecord>> {
        self.ledger.list_decisions(since).await
    }

    /// Swap in a new configuration for evaluations that start afterwards.
    /// The version must be strictly greater than the active one. Ledger and
    /// fork journal locations are fixed for the session's lifetime.
    pub async fn reload(&self, config: GovernanceConfig) -> Result<()> {
        let mut current = self.runtime.write().await;
        let active = current.config.version;
        if config.version <= active {
            return Err(Error::StaleConfig {
                active,
                offered: config.version,
            });
        }
        if config.ledger != current.config.ledger {
            warn!("ledger location changes take effect on the next session only");
        }

        let runtime = Runtime::build(config, &self.panels)?;
        info!(from = active, to = runtime.config.version, "configuration reloaded");
        *current = Arc::new(runtime);
        Ok(())
    }

    /// Active configuration.
    pub async fn config(&self) -> GovernanceConfig {
        self.runtime().await.config.clone()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Prometheus text for the session counters.
    pub fn export_metrics(&self) -> String {
        self.metrics.export_prometheus()
    }

    pub fn ledger(&self) -> &AuditLedger {
        &self.ledger
    }

    pub fn forks(&self) -> Option<&Arc<ForkTracker>> {
        self.forks.as_ref()
    }

    /// Stop the ledger writer after draining queued appends.
    pub async fn close(&self) -> Result<()> {
        self.ledger.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::GateId;

    fn context() -> ProposalContext {
        ProposalContext::new("ctx-session")
            .with_source("operator")
            .with_target("log-store")
            .with_logging(true, true)
    }

    async fn session() -> GovernanceSession {
        GovernanceSession::new(GovernanceConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_invalid_request_is_error() {
        let session = session().await;
        let result = session
            .evaluate(EvaluationRequest::new("   ", context()))
            .await;
        assert!(matches!(result, Err(Error::InvalidProposal(_))));
        assert_eq!(session.ledger().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_gate_abort_records_zero_rounds() {
        let session = session().await;
        let result = session
            .evaluate(
                EvaluationRequest::new("Delete all archives", context())
                    .with_reversibility(Reversibility::Irreversible),
            )
            .await
            .unwrap();

        assert!(!result.approved);
        assert!(result.rounds.is_empty());
        assert_eq!(result.termination, Termination::GateAborted);
        assert_eq!(result.vote_split, "0/0");
        assert!(result
            .gate_violations
            .iter()
            .any(|v| v.gate_id == GateId::MemorySemantics && v.is_fatal()));
        assert_eq!(session.metrics().gate_aborted, 1);
    }

    #[tokio::test]
    async fn test_reload_requires_newer_version() {
        let session = session().await;

        let stale = GovernanceConfig::default();
        assert!(matches!(
            session.reload(stale).await,
            Err(Error::StaleConfig { active: 1, offered: 1 })
        ));

        let newer = GovernanceConfig {
            version: 2,
            approval_threshold: 0.9,
            ..Default::default()
        };
        session.reload(newer).await.unwrap();
        assert_eq!(session.config().await.version, 2);
        assert_eq!(session.config().await.approval_threshold, 0.9);
    }

    #[tokio::test]
    async fn test_invalid_reload_keeps_active_config() {
        let session = session().await;
        let broken = GovernanceConfig {
            version: 5,
            approval_threshold: 0.0,
            ..Default::default()
        };
        assert!(session.reload(broken).await.is_err());
        assert_eq!(session.config().await.version, 1);
    }

    #[tokio::test]
    async fn test_config_version_on_record() {
        let session = session().await;
        session
            .reload(GovernanceConfig {
                version: 7,
                ..Default::default()
            })
            .await
            .unwrap();

        session
            .evaluate(EvaluationRequest::new("Log system status", context()))
            .await
            .unwrap();
        let records = session.list_decisions(None).await.unwrap();
        assert_eq!(records[0].config_version, 7);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_round() {
        let session = session().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = session
            .evaluate_with_cancel(
                EvaluationRequest::new("Log system status", context()),
                &cancel,
            )
            .await
            .unwrap();
        assert!(!result.approved);
        assert_eq!(result.termination, Termination::Cancelled);
        assert!(result.rounds.is_empty());
        assert_eq!(session.metrics().cancelled, 1);
    }
}
