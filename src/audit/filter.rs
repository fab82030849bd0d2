//! Query filters for decision records.

use crate::audit::record::DecisionRecord;
use crate::consensus::panel::GovernanceMode;
use crate::consensus::voting::Verdict;
use crate::core::Timestamp;
use crate::proposal::ProposalId;
use serde::{Deserialize, Serialize};

/// Filter for querying the ledger. Empty fields match everything.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DecisionFilter {
    /// Records at or after this time
    pub since: Option<Timestamp>,
    /// Records at or before this time
    pub until: Option<Timestamp>,
    pub context_id: Option<String>,
    pub proposal_id: Option<ProposalId>,
    pub instance_id: Option<String>,
    pub verdict: Option<Verdict>,
    pub mode: Option<GovernanceMode>,
    /// Maximum results
    pub limit: Option<usize>,
    /// Matching records to skip
    pub offset: Option<usize>,
}

impl DecisionFilter {
    /// Create an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn since(mut self, since: Timestamp) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: Timestamp) -> Self {
        self.until = Some(until);
        self
    }

    pub fn by_context(mut self, context_id: &str) -> Self {
        self.context_id = Some(context_id.to_string());
        self
    }

    pub fn by_proposal(mut self, proposal_id: ProposalId) -> Self {
        self.proposal_id = Some(proposal_id);
        self
    }

    pub fn by_instance(mut self, instance_id: &str) -> Self {
        self.instance_id = Some(instance_id.to_string());
        self
    }

    pub fn by_verdict(mut self, verdict: Verdict) -> Self {
        self.verdict = Some(verdict);
        self
    }

    pub fn by_mode(mut self, mode: GovernanceMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Check if a record matches, ignoring pagination.
    pub fn matches(&self, record: &DecisionRecord) -> bool {
        if let Some(since) = self.since {
            if record.timestamp < since {
                return false;
            }
        }

        if let Some(until) = self.until {
            if record.timestamp > until {
                return false;
            }
        }

        if let Some(context_id) = &self.context_id {
            if &record.context_id != context_id {
                return false;
            }
        }

        if let Some(proposal_id) = &self.proposal_id {
            if record.proposal.id() != proposal_id {
                return false;
            }
        }

        if let Some(instance_id) = &self.instance_id {
            if &record.instance_id != instance_id {
                return false;
            }
        }

        if let Some(verdict) = self.verdict {
            if record.final_verdict != verdict {
                return false;
            }
        }

        if let Some(mode) = self.mode {
            if record.governance_mode != mode {
                return false;
            }
        }

        true
    }

    /// Apply the filter and pagination to records in ledger order.
    pub fn apply<'a, I>(&self, records: I) -> Vec<DecisionRecord>
    where
        I: IntoIterator<Item = &'a DecisionRecord>,
    {
        records
            .into_iter()
            .filter(|r| self.matches(r))
            .skip(self.offset.unwrap_or(0))
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}
