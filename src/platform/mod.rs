//! Social platform capability.

pub mod nostr;

use anyhow::Result;
use async_trait::async_trait;
use nostr_core::Notification;

pub use self::nostr::NostrPlatform;

/// Reads and writes on the social platform the agent lives on.
#[async_trait]
pub trait SocialPlatform: Send + Sync {
    /// Notifications addressed to (or visible to) the agent, oldest first.
    async fn fetch_notifications(&self) -> Result<Vec<Notification>>;

    /// Publish a post, returning its platform identifier.
    async fn publish(&self, content: &str) -> Result<String>;

    /// Follow an identity (npub, hex key, or handle the platform can resolve).
    async fn follow(&self, identity: &str) -> Result<()>;

    /// The agent's own identity on the platform.
    fn own_identity(&self) -> String;
}
