use super::SocialPlatform;
use anyhow::{Context, Result};
use async_trait::async_trait;
use nostr_core::nostr_sdk::prelude::*;
use nostr_core::relay::to_notification;
use nostr_core::{Notification, Origin, RelayClient};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Nostr as the social platform: kind-1 notes, kind-3 follows.
pub struct NostrPlatform {
    relay: RelayClient,
    notification_limit: usize,
    lookback_secs: u64,
    include_timeline: bool,
}

impl NostrPlatform {
    pub fn new(
        relay: RelayClient,
        notification_limit: usize,
        lookback_secs: u64,
        include_timeline: bool,
    ) -> Self {
        Self {
            relay,
            notification_limit,
            lookback_secs,
            include_timeline,
        }
    }

    fn since(&self) -> Timestamp {
        Timestamp::from_secs(Timestamp::now().as_secs().saturating_sub(self.lookback_secs))
    }
}

/// Merge mention and timeline notifications, dropping repeated ids.
/// Mentions win over timeline copies of the same note.
pub fn merge_notifications(
    mentions: Vec<Notification>,
    timeline: Vec<Notification>,
) -> Vec<Notification> {
    let mut seen = HashSet::new();
    let mut merged: Vec<Notification> = mentions
        .into_iter()
        .chain(timeline)
        .filter(|n| seen.insert(n.external_id.clone()))
        .collect();
    merged.sort_by_key(|n| n.created_at);
    merged
}

#[async_trait]
impl SocialPlatform for NostrPlatform {
    async fn fetch_notifications(&self) -> Result<Vec<Notification>> {
        let since = self.since();
        let mentions: Vec<Notification> = self
            .relay
            .fetch_mentions(since, self.notification_limit)
            .await
            .context("Failed to fetch mentions")?
            .iter()
            .map(|e| to_notification(e, Origin::Mention))
            .collect();

        let mut timeline = Vec::new();
        if self.include_timeline {
            // Timeline failures are logged; mentions still flow.
            match self.relay.fetch_contacts().await {
                Ok(contacts) => match self
                    .relay
                    .fetch_timeline(&contacts, since, self.notification_limit)
                    .await
                {
                    Ok(events) => {
                        timeline = events
                            .iter()
                            .map(|e| to_notification(e, Origin::Timeline))
                            .collect();
                    }
                    Err(e) => warn!("Timeline fetch failed: {e:#}"),
                },
                Err(e) => warn!("Contact list fetch failed: {e:#}"),
            }
        }

        debug!(
            mentions = mentions.len(),
            timeline = timeline.len(),
            "Fetched notifications"
        );
        Ok(merge_notifications(mentions, timeline))
    }

    async fn publish(&self, content: &str) -> Result<String> {
        Ok(self.relay.publish_note(content).await?.to_hex())
    }

    async fn follow(&self, identity: &str) -> Result<()> {
        let target = PublicKey::parse(identity)
            .with_context(|| format!("Cannot resolve '{identity}' to a Nostr public key"))?;
        if target == self.relay.public_key() {
            anyhow::bail!("Refusing to follow our own key");
        }
        self.relay.follow(&target).await?;
        Ok(())
    }

    fn own_identity(&self) -> String {
        self.relay.npub()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(id: &str, origin: Origin, created_at: u64) -> Notification {
        Notification {
            external_id: id.to_string(),
            author: "npub1x".to_string(),
            content: id.to_string(),
            parent_ref: None,
            origin,
            created_at,
        }
    }

    #[test]
    fn merge_prefers_mentions_and_sorts() {
        let merged = merge_notifications(
            vec![n("a", Origin::Mention, 20)],
            vec![n("a", Origin::Timeline, 20), n("b", Origin::Timeline, 10)],
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].external_id, "b");
        assert_eq!(merged[1].origin, Origin::Mention);
    }
}
