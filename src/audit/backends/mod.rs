//! Ledger backend implementations.
//!
//! - Memory (process lifetime)
//! - JSONL (append-only file, reloaded on open)

pub mod jsonl;
pub mod memory;

pub use jsonl::JsonlBackend;
pub use memory::MemoryBackend;
