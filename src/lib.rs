//! Autonomous Nostr posting agent.
//!
//! Each cycle reads notifications, decides on side effects (transfers,
//! follows), distils a short-term memory, recalls related long-term memories,
//! writes a post, and gates persistence and publication on its significance.

pub mod app;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod platform;
pub mod providers;
pub mod scheduler;
pub mod store;
pub mod wallet;

pub use config::Config;
pub use error::{AttemptError, CycleError, StageError};
pub use pipeline::{CycleReport, Pipeline};
