//! Durable local stores (SQLite).

pub mod posts;
pub mod seen;
pub mod social;

pub use posts::{PostRecord, PostStore, User};
pub use seen::{SeenLedger, SeenNotificationStore};
pub use social::{IdentityEvaluation, IdentityStore};
