//! Fork lineage tracker.
//!
//! Detects when independent governance instances reach incompatible,
//! fatal-free verdicts on the same context and preserves both sides in a
//! lineage. The tracker can open lineages, add decisions, acknowledgments
//! and recognitions. It has no way to resolve, merge or delete a fork.

use crate::audit::record::{DecisionRecord, RecordId};
use crate::core::{now, Error, Result};
use crate::fork::journal::{ForkJournalConfig, LineageEvent, LineageJournal};
use crate::fork::lineage::{
    Acknowledgment, CompetingDecision, ForkLineage, LineageId, Recognition,
};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Default)]
struct TrackerState {
    lineages: Vec<ForkLineage>,
    by_id: HashMap<LineageId, usize>,
    by_context: HashMap<String, usize>,
    /// Latest unpaired decision per context, instance and side
    observed: HashMap<String, BTreeMap<(String, bool), CompetingDecision>>,
}

impl TrackerState {
    fn index_of(&self, lineage_id: &LineageId) -> Result<usize> {
        self.by_id
            .get(lineage_id)
            .copied()
            .ok_or_else(|| Error::LineageNotFound(lineage_id.to_string()))
    }

    /// Check an event against current state without changing it.
    fn validate(&self, event: &LineageEvent) -> Result<()> {
        match event {
            LineageEvent::Opened {
                lineage_id,
                context_id,
                ..
            } => {
                if self.by_id.contains_key(lineage_id) || self.by_context.contains_key(context_id) {
                    return Err(Error::DuplicateLineage(format!(
                        "lineage {} reopened for context {}",
                        lineage_id, context_id
                    )));
                }
                Ok(())
            }
            LineageEvent::DecisionAdded { lineage_id, .. }
            | LineageEvent::Acknowledged { lineage_id, .. } => self.index_of(lineage_id).map(|_| ()),
            LineageEvent::Recognized {
                lineage_id,
                recognition,
            } => {
                let index = self.index_of(lineage_id)?;
                if !self.lineages[index].contains(&recognition.record_id) {
                    return Err(Error::DecisionNotInLineage {
                        lineage: lineage_id.to_string(),
                        record: recognition.record_id.to_string(),
                    });
                }
                Ok(())
            }
            LineageEvent::Observed { .. } => Ok(()),
        }
    }

    /// Apply a validated event.
    fn apply(&mut self, event: LineageEvent) {
        match event {
            LineageEvent::Opened {
                lineage_id,
                context_id,
                decisions,
                at,
            } => {
                let index = self.lineages.len();
                self.by_id.insert(lineage_id.clone(), index);
                self.by_context.insert(context_id.clone(), index);
                self.observed.remove(&context_id);
                self.lineages
                    .push(ForkLineage::open(lineage_id, &context_id, decisions, at));
            }
            LineageEvent::DecisionAdded {
                lineage_id,
                decision,
            } => {
                if let Some(&index) = self.by_id.get(&lineage_id) {
                    self.lineages[index].add_decision(decision);
                }
            }
            LineageEvent::Acknowledged {
                lineage_id,
                acknowledgment,
            } => {
                if let Some(&index) = self.by_id.get(&lineage_id) {
                    self.lineages[index].add_acknowledgment(acknowledgment);
                }
            }
            LineageEvent::Recognized {
                lineage_id,
                recognition,
            } => {
                if let Some(&index) = self.by_id.get(&lineage_id) {
                    self.lineages[index].add_recognition(recognition);
                }
            }
            LineageEvent::Observed {
                context_id,
                decision,
            } => {
                if !self.by_context.contains_key(&context_id) {
                    let key = (decision.instance_id.clone(), decision.approved);
                    self.observed
                        .entry(context_id)
                        .or_default()
                        .insert(key, decision);
                }
            }
        }
    }
}

/// Tracks fork lineages, optionally journaled to disk.
pub struct ForkTracker {
    state: RwLock<TrackerState>,
    journal: Option<LineageJournal>,
}

impl ForkTracker {
    /// Tracker without persistence.
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(TrackerState::default()),
            journal: None,
        }
    }

    /// Open the journal and replay it.
    pub fn open(config: &ForkJournalConfig) -> Result<Self> {
        let (journal, events) = LineageJournal::open(&config.path)?;
        let mut state = TrackerState::default();
        let replayed = events.len();
        for event in events {
            state.validate(&event)?;
            state.apply(event);
        }
        info!(
            path = %config.path.display(),
            events = replayed,
            lineages = state.lineages.len(),
            "fork tracker restored"
        );

        Ok(Self {
            state: RwLock::new(state),
            journal: Some(journal),
        })
    }

    /// Whether two records form a fork: same context, different instances,
    /// approval against non-approval, and no fatal violation on either.
    pub fn is_fork(a: &DecisionRecord, b: &DecisionRecord) -> bool {
        a.context_id == b.context_id
            && !a.has_fatal_violation()
            && !b.has_fatal_violation()
            && CompetingDecision::from_record(a).competes_with(&CompetingDecision::from_record(b))
    }

    /// Journal first, then change state.
    fn commit(&self, state: &mut TrackerState, event: LineageEvent) -> Result<()> {
        state.validate(&event)?;
        if let Some(journal) = &self.journal {
            journal.append(&event)?;
        }
        state.apply(event);
        Ok(())
    }

    fn join_existing(
        &self,
        state: &mut TrackerState,
        index: usize,
        decisions: Vec<CompetingDecision>,
    ) -> Result<LineageId> {
        let lineage_id = state.lineages[index].lineage_id().clone();
        for decision in decisions {
            if state.lineages[index].contains(&decision.record_id) {
                continue;
            }
            debug!(lineage = %lineage_id, record = %decision.record_id, "decision joins lineage");
            self.commit(
                state,
                LineageEvent::DecisionAdded {
                    lineage_id: lineage_id.clone(),
                    decision,
                },
            )?;
        }
        Ok(lineage_id)
    }

    fn open_lineage(
        &self,
        state: &mut TrackerState,
        context_id: &str,
        decisions: Vec<CompetingDecision>,
    ) -> Result<LineageId> {
        let lineage_id = LineageId::generate();
        self.commit(
            state,
            LineageEvent::Opened {
                lineage_id: lineage_id.clone(),
                context_id: context_id.to_string(),
                decisions,
                at: now(),
            },
        )?;
        info!(lineage = %lineage_id, context = context_id, "fork lineage opened");
        Ok(lineage_id)
    }

    /// Compare two records. Returns the lineage holding them when they
    /// fork; a context that already forked keeps its lineage.
    pub async fn detect_fork(
        &self,
        a: &DecisionRecord,
        b: &DecisionRecord,
    ) -> Result<Option<LineageId>> {
        if !Self::is_fork(a, b) {
            return Ok(None);
        }

        let decisions = vec![
            CompetingDecision::from_record(a),
            CompetingDecision::from_record(b),
        ];
        let mut state = self.state.write().await;

        let existing = state.by_context.get(&a.context_id).copied();
        let lineage_id = match existing {
            Some(index) => self.join_existing(&mut state, index, decisions)?,
            None => self.open_lineage(&mut state, &a.context_id, decisions)?,
        };
        Ok(Some(lineage_id))
    }

    /// Feed a finalized record. Opens a lineage when it competes with an
    /// earlier observed record, or joins the context's existing lineage.
    ///
    /// Unpaired records are journaled, and only the latest one per
    /// instance and side of a context is kept for pairing.
    pub async fn observe(&self, record: &DecisionRecord) -> Result<Option<LineageId>> {
        if record.has_fatal_violation() {
            return Ok(None);
        }

        let decision = CompetingDecision::from_record(record);
        let mut state = self.state.write().await;

        if let Some(index) = state.by_context.get(&record.context_id).copied() {
            return self
                .join_existing(&mut state, index, vec![decision])
                .map(Some);
        }

        let rival = state
            .observed
            .get(&record.context_id)
            .and_then(|seen| seen.values().find(|d| d.competes_with(&decision)).cloned());

        match rival {
            Some(rival) => self
                .open_lineage(&mut state, &record.context_id, vec![rival, decision])
                .map(Some),
            None => {
                self.commit(
                    &mut state,
                    LineageEvent::Observed {
                        context_id: record.context_id.clone(),
                        decision,
                    },
                )?;
                Ok(None)
            }
        }
    }

    /// Record that an instance knows about the fork. No verdict changes.
    pub async fn acknowledge_fork(
        &self,
        lineage_id: &LineageId,
        instance_id: &str,
        note: &str,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        self.commit(
            &mut state,
            LineageEvent::Acknowledged {
                lineage_id: lineage_id.clone(),
                acknowledgment: Acknowledgment::new(instance_id, note),
            },
        )
    }

    /// A third party lends weight to one side of the fork.
    pub async fn recognize(
        &self,
        lineage_id: &LineageId,
        record_id: &RecordId,
        recognizer: &str,
        basis: &str,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        self.commit(
            &mut state,
            LineageEvent::Recognized {
                lineage_id: lineage_id.clone(),
                recognition: Recognition::new(record_id.clone(), recognizer, basis),
            },
        )
    }

    pub async fn lineage(&self, lineage_id: &LineageId) -> Option<ForkLineage> {
        let state = self.state.read().await;
        state
            .by_id
            .get(lineage_id)
            .map(|&index| state.lineages[index].clone())
    }

    pub async fn lineage_for_context(&self, context_id: &str) -> Option<ForkLineage> {
        let state = self.state.read().await;
        state
            .by_context
            .get(context_id)
            .map(|&index| state.lineages[index].clone())
    }

    /// All lineages in the order they opened.
    pub async fn lineages(&self) -> Vec<ForkLineage> {
        self.state.read().await.lineages.clone()
    }
}
