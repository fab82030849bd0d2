//! Governance Configuration
//!
//! Loaded once when a session starts and immutable afterwards. A new
//! configuration takes effect only through a versioned reload.

pub mod loader;

pub use loader::ConfigLoader;

use crate::audit::config::LedgerConfig;
use crate::consensus::engine::{EngineConfig, DEFAULT_MAX_SYNTHESIS_ROUNDS, MAX_SYNTHESIS_ROUNDS_CEILING};
use crate::consensus::member::{AxiomMember, MemberRegistry, Stance, VotingMember};
use crate::consensus::voting::{Aggregator, DEFAULT_APPROVAL_THRESHOLD};
use crate::core::{Axiom, Error, Result};
use crate::fork::journal::ForkJournalConfig;
use crate::monitoring::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

fn default_weight() -> f64 {
    1.0
}

/// One council member.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemberConfig {
    pub id: String,
    pub stance: Stance,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Defaults to the stance's own axiom
    #[serde(default)]
    pub affinities: Vec<Axiom>,
}

impl MemberConfig {
    pub fn new(id: &str, stance: Stance) -> Self {
        Self {
            id: id.to_string(),
            stance,
            weight: 1.0,
            affinities: Vec::new(),
        }
    }

    pub fn to_member(&self) -> AxiomMember {
        AxiomMember::new(&self.id, self.stance)
            .with_weight(self.weight)
            .with_affinities(self.affinities.clone())
    }
}

/// Full governance configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Monotonic version; reloads must raise it
    pub version: u64,
    /// Identifies this instance on its decision records
    pub instance_id: String,
    pub approval_threshold: f64,
    /// Synthesis rounds after the first vote
    pub max_synthesis_rounds: u32,
    pub round_timeout_ms: u64,
    pub availability_timeout_ms: u64,
    /// ID of the single arbiter on the fast path
    pub arbiter_id: String,
    pub members: Vec<MemberConfig>,
    /// Multipliers applied to member weights by invoked axiom
    pub axiom_weights: BTreeMap<Axiom, f64>,
    pub ledger: LedgerConfig,
    /// Fork journal; forks are not tracked when absent
    pub forks: Option<ForkJournalConfig>,
    pub logging: LoggingConfig,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            version: 1,
            instance_id: "governor".to_string(),
            approval_threshold: DEFAULT_APPROVAL_THRESHOLD,
            max_synthesis_rounds: DEFAULT_MAX_SYNTHESIS_ROUNDS,
            round_timeout_ms: 5_000,
            availability_timeout_ms: 1_000,
            arbiter_id: "arbiter".to_string(),
            members: vec![
                MemberConfig::new("guardian", Stance::Preservation),
                MemberConfig::new("optimizer", Stance::Efficiency),
                MemberConfig::new("witness", Stance::Transparency),
                MemberConfig::new("sentinel", Stance::Safety),
                MemberConfig::new("steward", Stance::Autonomy),
            ],
            axiom_weights: BTreeMap::new(),
            ledger: LedgerConfig::default(),
            forks: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl GovernanceConfig {
    /// Check ranges and uniqueness.
    pub fn validate(&self) -> Result<()> {
        if self.instance_id.trim().is_empty() {
            return Err(Error::InvalidConfig("instance_id must not be empty".to_string()));
        }
        if !(self.approval_threshold > 0.0 && self.approval_threshold <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "approval_threshold must be in (0, 1], got {}",
                self.approval_threshold
            )));
        }
        if self.max_synthesis_rounds > MAX_SYNTHESIS_ROUNDS_CEILING {
            return Err(Error::InvalidConfig(format!(
                "max_synthesis_rounds must be at most {}, got {}",
                MAX_SYNTHESIS_ROUNDS_CEILING, self.max_synthesis_rounds
            )));
        }
        if self.round_timeout_ms == 0 || self.availability_timeout_ms == 0 {
            return Err(Error::InvalidConfig("timeouts must be positive".to_string()));
        }
        if self.arbiter_id.trim().is_empty() {
            return Err(Error::InvalidConfig("arbiter_id must not be empty".to_string()));
        }
        if self.members.is_empty() {
            return Err(Error::InvalidConfig("council needs at least one member".to_string()));
        }

        let mut seen = HashSet::new();
        for member in &self.members {
            if member.id.trim().is_empty() {
                return Err(Error::InvalidConfig("member id must not be empty".to_string()));
            }
            if !seen.insert(member.id.as_str()) {
                return Err(Error::DuplicateMember(member.id.clone()));
            }
            if !member.weight.is_finite() || member.weight < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "member {} has invalid weight {}",
                    member.id, member.weight
                )));
            }
        }

        for (axiom, weight) in &self.axiom_weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "axiom weight for {} is invalid: {}",
                    axiom, weight
                )));
            }
        }

        Ok(())
    }

    /// Council members in configured order.
    pub fn build_registry(&self) -> Result<MemberRegistry> {
        let members: Vec<Arc<dyn VotingMember>> = self
            .members
            .iter()
            .map(|m| Arc::new(m.to_member()) as Arc<dyn VotingMember>)
            .collect();
        MemberRegistry::from_members(members)
    }

    pub fn aggregator(&self) -> Aggregator {
        Aggregator::new(self.approval_threshold)
            .with_axiom_weights(self.axiom_weights.clone().into_iter().collect())
    }

    pub fn round_timeout(&self) -> Duration {
        Duration::from_millis(self.round_timeout_ms)
    }

    pub fn availability_timeout(&self) -> Duration {
        Duration::from_millis(self.availability_timeout_ms)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_synthesis_rounds: self.max_synthesis_rounds,
            round_timeout: self.round_timeout(),
        }
    }
}
