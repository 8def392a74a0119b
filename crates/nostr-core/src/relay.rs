//! Nostr relay client wrapper for reading notifications and publishing.

use crate::context::{Notification, Origin};
use anyhow::{Context, Result};
use nostr_sdk::prelude::*;
use std::time::Duration;
use tracing::{debug, info};

/// A Nostr relay client bound to the agent's keys.
#[derive(Clone)]
pub struct RelayClient {
    client: Client,
    keys: Keys,
    fetch_timeout: Duration,
}

impl RelayClient {
    /// Create a new relay client with the given keys and relay URLs.
    pub async fn new(keys: Keys, relay_urls: Vec<String>) -> Result<Self> {
        let client = Client::new(keys.clone());

        for relay_url in &relay_urls {
            client
                .add_relay(relay_url.as_str())
                .await
                .with_context(|| format!("Failed to add relay: {}", relay_url))?;
        }

        client.connect().await;
        info!("Relay client connected to {} relay(s)", relay_urls.len());

        Ok(Self {
            client,
            keys,
            fetch_timeout: Duration::from_secs(10),
        })
    }

    /// Override how long a single relay query may take.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn public_key(&self) -> PublicKey {
        self.keys.public_key()
    }

    /// Our public key as npub.
    pub fn npub(&self) -> String {
        let pk = self.keys.public_key();
        pk.to_bech32().unwrap_or_else(|_| pk.to_hex())
    }

    /// Send an event builder to relays.
    pub async fn send_event_builder(&self, builder: EventBuilder) -> Result<EventId> {
        let output = self.client.send_event_builder(builder).await?;
        Ok(output.val)
    }

    /// Publish a kind-1 text note.
    pub async fn publish_note(&self, content: &str) -> Result<EventId> {
        let id = self
            .send_event_builder(EventBuilder::new(Kind::TextNote, content))
            .await
            .context("Failed to publish text note")?;
        debug!(event_id = %id, "Published text note");
        Ok(id)
    }

    /// Fetch events matching the given filter with a timeout.
    pub async fn fetch_events(&self, filter: Filter, timeout: Duration) -> Result<Vec<Event>> {
        let events = tokio::time::timeout(timeout, self.client.fetch_events(filter, timeout))
            .await
            .context("Timeout fetching events")?
            .context("Failed to fetch events")?;
        let mut events: Vec<Event> = events.into_iter().collect();
        events.sort_by_key(|e| e.created_at);
        Ok(events)
    }

    /// Fetch kind-1 notes that p-tag us, oldest first, excluding our own.
    pub async fn fetch_mentions(&self, since: Timestamp, limit: usize) -> Result<Vec<Event>> {
        let filter = Filter::new()
            .kind(Kind::TextNote)
            .pubkey(self.keys.public_key())
            .since(since)
            .limit(limit);
        let events = self.fetch_events(filter, self.fetch_timeout).await?;
        Ok(events.into_iter().filter(|e| !self.is_own_event(e)).collect())
    }

    /// Fetch kind-1 notes by the given authors, oldest first.
    pub async fn fetch_timeline(
        &self,
        authors: &[PublicKey],
        since: Timestamp,
        limit: usize,
    ) -> Result<Vec<Event>> {
        if authors.is_empty() {
            return Ok(Vec::new());
        }
        let filter = Filter::new()
            .kind(Kind::TextNote)
            .authors(authors.iter().copied())
            .since(since)
            .limit(limit);
        self.fetch_events(filter, self.fetch_timeout).await
    }

    /// Our latest kind-3 contact list, if any relay has one.
    pub async fn fetch_contact_list(&self) -> Result<Option<Event>> {
        let filter = Filter::new()
            .author(self.keys.public_key())
            .kind(Kind::ContactList)
            .limit(1);
        let events = self.fetch_events(filter, self.fetch_timeout).await?;
        Ok(events.into_iter().max_by_key(|e| e.created_at))
    }

    /// Public keys we currently follow.
    pub async fn fetch_contacts(&self) -> Result<Vec<PublicKey>> {
        Ok(self
            .fetch_contact_list()
            .await?
            .map(|event| contacts_of(&event))
            .unwrap_or_default())
    }

    /// Add `target` to our contact list and republish it.
    ///
    /// Returns `false` without publishing when `target` is already followed.
    pub async fn follow(&self, target: &PublicKey) -> Result<bool> {
        let current = self.fetch_contact_list().await?;
        let Some(builder) = contact_list_with(current.as_ref(), target) else {
            debug!("Already following {}", target.to_hex());
            return Ok(false);
        };
        self.send_event_builder(builder)
            .await
            .context("Failed to publish contact list")?;
        info!("Now following {}", target.to_hex());
        Ok(true)
    }

    /// Check if an event was sent by our keys.
    pub fn is_own_event(&self, event: &Event) -> bool {
        event.pubkey == self.keys.public_key()
    }
}

/// The event id a note replies to.
///
/// Prefers the `e` tag marked `reply`, then the one marked `root`, then the
/// last positional `e` tag.
pub fn reply_parent(event: &Event) -> Option<String> {
    let e_tags: Vec<(&str, Option<&str>)> = event
        .tags
        .iter()
        .filter_map(|tag| {
            let s = tag.as_slice();
            if s.first().map(|v| v.as_str()) != Some("e") {
                return None;
            }
            let id = s.get(1)?.as_str();
            Some((id, s.get(3).map(|m| m.as_str())))
        })
        .collect();

    e_tags
        .iter()
        .find(|(_, marker)| *marker == Some("reply"))
        .or_else(|| e_tags.iter().find(|(_, marker)| *marker == Some("root")))
        .or_else(|| e_tags.last())
        .map(|(id, _)| id.to_string())
}

/// Normalize a relay event into a [`Notification`].
///
/// A note with a reply parent becomes [`Origin::Reply`], anything else takes
/// `fallback`.
pub fn to_notification(event: &Event, fallback: Origin) -> Notification {
    let parent_ref = reply_parent(event);
    let origin = if parent_ref.is_some() {
        Origin::Reply
    } else {
        fallback
    };
    Notification {
        external_id: event.id.to_hex(),
        author: event
            .pubkey
            .to_bech32()
            .unwrap_or_else(|_| event.pubkey.to_hex()),
        content: event.content.to_string(),
        parent_ref,
        origin,
        created_at: event.created_at.as_secs(),
    }
}

/// Public keys in the `p` tags of a contact list.
pub fn contacts_of(event: &Event) -> Vec<PublicKey> {
    event
        .tags
        .iter()
        .filter_map(|tag| {
            let s = tag.as_slice();
            if s.first().map(|v| v.as_str()) == Some("p") {
                s.get(1).and_then(|hex| PublicKey::from_hex(hex).ok())
            } else {
                None
            }
        })
        .collect()
}

/// Build a contact list that adds `target` to `current`, keeping existing
/// tags and content. `None` when `target` is already present.
pub fn contact_list_with(current: Option<&Event>, target: &PublicKey) -> Option<EventBuilder> {
    let (mut tags, content): (Vec<Tag>, String) = match current {
        Some(event) => (event.tags.iter().cloned().collect(), event.content.to_string()),
        None => (Vec::new(), String::new()),
    };

    if current.is_some_and(|event| contacts_of(event).contains(target)) {
        return None;
    }

    tags.push(Tag::custom(TagKind::custom("p"), vec![target.to_hex()]));
    Some(EventBuilder::new(Kind::ContactList, content).tags(tags))
}
