//! Evaluator panels: the single arbiter or the full council.
//!
//! A panel convenes one round: members are evaluated concurrently on
//! spawned tasks and joined under a shared deadline. Members that miss the
//! deadline, fail, or answer under another member's id are recorded as
//! missing, which blocks the round. Vote weight always comes from the
//! registered member, never from the vote itself.

use crate::consensus::member::{Ballot, MemberRegistry, VotingMember};
use crate::consensus::voting::{Aggregator, MissingVote, Vote, VotingRound};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, warn};

/// Which governance path produced a decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GovernanceMode {
    Arbiter,
    Council,
}

impl std::fmt::Display for GovernanceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GovernanceMode::Arbiter => write!(f, "ARBITER"),
            GovernanceMode::Council => write!(f, "COUNCIL"),
        }
    }
}

/// A set of evaluators that votes as one path.
#[derive(Clone)]
pub struct Panel {
    mode: GovernanceMode,
    members: Vec<Arc<dyn VotingMember>>,
}

impl Panel {
    /// Single-arbiter panel.
    pub fn arbiter(arbiter: Arc<dyn VotingMember>) -> Self {
        Self {
            mode: GovernanceMode::Arbiter,
            members: vec![arbiter],
        }
    }

    /// Full council panel.
    pub fn council(registry: &MemberRegistry) -> Self {
        Self {
            mode: GovernanceMode::Council,
            members: registry.members().to_vec(),
        }
    }

    pub fn mode(&self) -> GovernanceMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// A panel is available when every member answers its probe in time.
    /// An empty panel is never available.
    pub async fn is_available(&self, probe_timeout: Duration) -> bool {
        if self.members.is_empty() {
            return false;
        }

        let probes = self.members.iter().map(|member| async move {
            match timeout(probe_timeout, member.is_available()).await {
                Ok(available) => available,
                Err(_) => {
                    warn!(member = member.id(), "availability probe timed out");
                    false
                }
            }
        });

        futures::future::join_all(probes)
            .await
            .into_iter()
            .all(|available| available)
    }

    /// Run one round over `ballot`.
    pub async fn convene(
        &self,
        ballot: Ballot,
        aggregator: &Aggregator,
        round_timeout: Duration,
    ) -> VotingRound {
        let round_number = ballot.round_number;
        let proposal_ref = ballot.proposal.id().clone();
        let ballot = Arc::new(ballot);
        let deadline = Instant::now() + round_timeout;

        let mut handles = Vec::with_capacity(self.members.len());
        for member in &self.members {
            let member = Arc::clone(member);
            let ballot = Arc::clone(&ballot);
            let id = member.id().to_string();
            let weight = member.weight();
            let handle = tokio::spawn(async move { member.evaluate(&ballot).await });
            handles.push((id, weight, handle));
        }

        let mut votes: Vec<Vote> = Vec::new();
        let mut missing: Vec<MissingVote> = Vec::new();

        for (member_id, weight, mut handle) in handles {
            let reason = match timeout_at(deadline, &mut handle).await {
                Ok(Ok(Ok(vote))) if vote.member_id == member_id => {
                    votes.push(vote.with_weight(weight));
                    continue;
                }
                Ok(Ok(Ok(vote))) => format!("vote cast under foreign id {}", vote.member_id),
                Ok(Ok(Err(err))) => err.to_string(),
                Ok(Err(join_err)) => format!("evaluation task failed: {}", join_err),
                Err(_) => {
                    handle.abort();
                    "round deadline elapsed".to_string()
                }
            };
            warn!(member = %member_id, %reason, round = round_number, "missing vote");
            missing.push(MissingVote { member_id, reason });
        }

        let round = aggregator.tally(round_number, &proposal_ref, votes, missing);
        debug!(
            mode = %self.mode,
            round = round.round_number,
            verdict = %round.verdict,
            split = %round.vote_split(),
            "round closed"
        );
        round
    }
}
