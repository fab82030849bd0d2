//! # Ethos Governor
//!
//! An ethical governance engine that gates proposed actions:
//! - **Gates**: structural checks before any vote
//! - **Consensus**: weighted council voting with veto, or a single arbiter
//!   for routine work
//! - **Synthesis**: bounded compromise rounds when axioms conflict
//! - **Audit**: append-only, hash-chained decision ledger
//! - **Forks**: preserved lineages when independent instances disagree
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ethos_governor::{EvaluationRequest, GovernanceConfig, GovernanceSession};
//! use ethos_governor::proposal::{Criticality, ProposalContext};
//!
//! #[tokio::main]
//! async fn main() -> ethos_governor::Result<()> {
//!     let session = GovernanceSession::new(GovernanceConfig::default()).await?;
//!
//!     let context = ProposalContext::new("maintenance-42")
//!         .with_source("operator")
//!         .with_target("log-store")
//!         .with_logging(true, true);
//!     let request = EvaluationRequest::new("Log system status", context)
//!         .with_criticality(Criticality::Routine);
//!
//!     let result = session.evaluate(request).await?;
//!     println!("approved: {} ({})", result.approved, result.rationale);
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod config;
pub mod consensus;
pub mod core;
pub mod fork;
pub mod monitoring;
pub mod proposal;
pub mod session;

pub use config::{ConfigLoader, GovernanceConfig, MemberConfig};
pub use crate::core::error::{Error, Result};
pub use session::{DecisionResult, EvaluationRequest, GovernanceSession, SessionBuilder};
