//! Long-term memory for Snowpost.
//!
//! Memories are generated posts that cleared the significance gate. Each one
//! is stored with its embedding and a 1–10 significance score in an
//! append-only SQLite log, and recalled by cosine similarity against the
//! embedding of the current short-term memory.

pub mod config;
pub mod error;
pub mod ranking;
pub mod store;
pub mod types;

pub use config::MemoryConfig;
pub use error::MemoryError;
pub use ranking::{cosine_similarity, format_memories, rank_memories, NO_MEMORIES};
pub use store::SqliteMemoryStore;
pub use types::{clamp_significance, MemoryRecord, RankedMemory};
