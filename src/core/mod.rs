//! Core utilities and common types for the governor.

pub mod error;
pub mod jsonl;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
