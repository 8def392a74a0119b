//! Nostr platform plumbing for Snowpost.
//!
//! This crate turns relay traffic into the normalized notification model the
//! pipeline consumes: a relay client for mentions, timeline reads, publishing
//! and follows, thread reconstruction over reply chains, and detection of
//! handles and wallet addresses in notification text.

pub mod context;
pub mod mention;
pub mod relay;

// Re-export commonly used types
pub use context::{
    format_timestamp, reconstruct_threads, render_threads, truncate_npub, Notification, Origin,
    Thread,
};
pub use mention::{detect_addresses, detect_handles};
pub use relay::{contact_list_with, contacts_of, reply_parent, to_notification, RelayClient};

// Re-export nostr-sdk for convenience
pub use nostr_sdk;
