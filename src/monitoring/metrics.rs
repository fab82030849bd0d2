//! Decision counters.
//!
//! Monotonic counters updated once per recorded decision, readable as a
//! snapshot or in Prometheus text format.

use crate::audit::record::DecisionRecord;
use crate::consensus::engine::Termination;
use crate::consensus::voting::Verdict;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric (monotonically increasing).
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment by 1.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment by amount.
    pub fn add(&self, amount: u64) {
        self.value.fetch_add(amount, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Point-in-time copy of the counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub decisions_total: u64,
    pub approved: u64,
    pub rejected: u64,
    pub vetoed: u64,
    pub blocked: u64,
    pub gate_aborted: u64,
    pub synthesis_rounds: u64,
    pub synthesis_applied: u64,
    pub fallbacks: u64,
    pub cancelled: u64,
}

/// Counters kept by a governance session.
#[derive(Debug, Default)]
pub struct DecisionMetrics {
    decisions_total: Counter,
    approved: Counter,
    rejected: Counter,
    vetoed: Counter,
    blocked: Counter,
    gate_aborted: Counter,
    synthesis_rounds: Counter,
    synthesis_applied: Counter,
    fallbacks: Counter,
    cancelled: Counter,
}

impl DecisionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one recorded decision.
    pub fn record(&self, record: &DecisionRecord, fallback: bool) {
        self.decisions_total.inc();

        match record.final_verdict {
            Verdict::Approved if record.approved() => self.approved.inc(),
            Verdict::Approved | Verdict::Blocked => self.blocked.inc(),
            Verdict::Rejected => self.rejected.inc(),
            Verdict::Vetoed => self.vetoed.inc(),
        }

        match record.termination {
            Termination::GateAborted | Termination::SynthesisGateAborted => {
                self.gate_aborted.inc()
            }
            Termination::Cancelled => self.cancelled.inc(),
            _ => {}
        }

        self.synthesis_rounds
            .add(record.rounds.len().saturating_sub(1) as u64);
        if record.synthesis_applied {
            self.synthesis_applied.inc();
        }
        if fallback {
            self.fallbacks.inc();
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            decisions_total: self.decisions_total.get(),
            approved: self.approved.get(),
            rejected: self.rejected.get(),
            vetoed: self.vetoed.get(),
            blocked: self.blocked.get(),
            gate_aborted: self.gate_aborted.get(),
            synthesis_rounds: self.synthesis_rounds.get(),
            synthesis_applied: self.synthesis_applied.get(),
            fallbacks: self.fallbacks.get(),
            cancelled: self.cancelled.get(),
        }
    }

    /// Export counters in Prometheus format.
    pub fn export_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let series: [(&str, &str, u64); 10] = [
            ("governor_decisions_total", "Decisions recorded", snapshot.decisions_total),
            ("governor_approved_total", "Decisions approved", snapshot.approved),
            ("governor_rejected_total", "Decisions rejected", snapshot.rejected),
            ("governor_vetoed_total", "Decisions vetoed", snapshot.vetoed),
            ("governor_blocked_total", "Decisions blocked", snapshot.blocked),
            ("governor_gate_aborted_total", "Decisions aborted by a fatal gate", snapshot.gate_aborted),
            ("governor_synthesis_rounds_total", "Rounds voted on synthesized proposals", snapshot.synthesis_rounds),
            ("governor_synthesis_applied_total", "Decisions approved through synthesis", snapshot.synthesis_applied),
            ("governor_fallbacks_total", "Decisions routed to the fallback path", snapshot.fallbacks),
            ("governor_cancelled_total", "Decisions cancelled between rounds", snapshot.cancelled),
        ];

        let mut output = String::new();
        for (name, help, value) in series {
            output.push_str(&format!("# HELP {} {}\n", name, help));
            output.push_str(&format!("# TYPE {} counter\n", name));
            output.push_str(&format!("{} {}\n", name, value));
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::panel::GovernanceMode;
    use crate::proposal::{Criticality, Proposal, ProposalContext, Reversibility};

    fn record(verdict: Verdict, termination: Termination) -> DecisionRecord {
        let proposal = Proposal::new(
            "Check replication lag",
            "",
            Reversibility::Reversible,
            Criticality::Routine,
            ProposalContext::new("ctx"),
        )
        .unwrap();
        DecisionRecord::new("node-a", proposal, GovernanceMode::Arbiter, 1)
            .with_outcome(verdict, termination)
    }

    #[test]
    fn test_counter() {
        let counter = Counter::new();
        counter.inc();
        counter.add(4);
        assert_eq!(counter.get(), 5);
    }

    #[test]
    fn test_record_outcomes() {
        let metrics = DecisionMetrics::new();
        metrics.record(&record(Verdict::Approved, Termination::Approved), false);
        metrics.record(&record(Verdict::Vetoed, Termination::NoConflict), false);
        metrics.record(&record(Verdict::Blocked, Termination::GateAborted), false);
        metrics.record(&record(Verdict::Blocked, Termination::Blocked), true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.decisions_total, 4);
        assert_eq!(snapshot.approved, 1);
        assert_eq!(snapshot.vetoed, 1);
        assert_eq!(snapshot.blocked, 2);
        assert_eq!(snapshot.gate_aborted, 1);
        assert_eq!(snapshot.fallbacks, 1);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = DecisionMetrics::new();
        metrics.record(&record(Verdict::Approved, Termination::Approved), false);

        let output = metrics.export_prometheus();
        assert!(output.contains("# TYPE governor_decisions_total counter"));
        assert!(output.contains("governor_approved_total 1"));
    }
}
