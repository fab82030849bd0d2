//! Fork Lineage Module
//!
//! Preserves irreconcilable verdicts reached by independent governance
//! instances on the same context, without forcing a resolution.

pub mod journal;
pub mod lineage;
pub mod tracker;

pub use journal::{ForkJournalConfig, LineageEvent, LineageJournal};
pub use lineage::{Acknowledgment, CompetingDecision, ForkLineage, LineageId, Recognition};
pub use tracker::ForkTracker;
