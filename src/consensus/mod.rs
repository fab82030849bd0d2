//! Consensus Module
//!
//! Decides whether a proposal may proceed:
//! - Gate validation before any vote
//! - Weighted member voting with veto override
//! - Conflict detection and bounded compromise synthesis
//! - Arbiter / council routing with fallback

pub mod conflict;
pub mod engine;
pub mod gates;
pub mod member;
pub mod panel;
pub mod router;
pub mod synthesis;
pub mod voting;

pub use conflict::{AxisPair, ConflictDetector, ConflictReport};
pub use engine::{
    Deliberation, DeliberationEngine, EngineConfig, ExhaustionReason, Termination,
    DEFAULT_MAX_SYNTHESIS_ROUNDS, MAX_SYNTHESIS_ROUNDS_CEILING,
};
pub use gates::{Gate, GateId, GateValidator, GateViolation, Severity};
pub use member::{ArbiterMember, AxiomMember, Ballot, MemberRegistry, Stance, VotingMember};
pub use panel::{GovernanceMode, Panel};
pub use router::{Route, Router};
pub use synthesis::{Rewrite, SynthesisGenerator, SynthesisTemplate};
pub use voting::{Aggregator, MissingVote, Verdict, Vote, VotingRound, DEFAULT_APPROVAL_THRESHOLD};
