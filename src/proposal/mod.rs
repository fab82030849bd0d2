//! Proposal Module
//!
//! Proposals, their structured context, operation-type classification and
//! the pluggable axiom classifier.

pub mod classifier;
pub mod entities;
pub mod operation;

pub use classifier::{Classifier, KeywordClassifier};
pub use entities::{
    Criticality, MemoryFootprint, Proposal, ProposalContext, ProposalId, ProposalOrigin,
    Reversibility, SynthesisOrigin,
};
pub use operation::{OperationKind, VerbClass};
