//! Context aggregation: dedupe notifications and normalize them for prompts.

use crate::store::{PostRecord, SeenLedger};
use nostr_core::{reconstruct_threads, render_threads, Notification, Origin};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Rendered in place of the notification block when nothing new arrived.
pub const NO_NEW_NOTIFICATIONS: &str = "No new notifications";

/// Everything one cycle knows about the outside world.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Notifications consumed by this cycle, oldest first.
    pub novel: Vec<Notification>,
    /// Our own published posts, used to root reply threads.
    pub anchors: Vec<Notification>,
    /// Local recent posts, newest first.
    pub recent_posts: Vec<PostRecord>,
}

impl Context {
    pub fn has_new_notifications(&self) -> bool {
        !self.novel.is_empty()
    }

    /// Threaded view of the new notifications for generation prompts.
    /// Own posts only show up as the roots replies hang from.
    pub fn render(&self) -> String {
        if self.novel.is_empty() {
            return NO_NEW_NOTIFICATIONS.to_string();
        }
        let items: Vec<Notification> = self
            .anchors
            .iter()
            .chain(self.novel.iter())
            .cloned()
            .collect();
        render_threads(&reconstruct_threads(&items))
    }

    /// Flat `@author: content` lines with full author identities, for the
    /// action decisions.
    pub fn notification_text(&self) -> String {
        self.novel
            .iter()
            .map(|n| format!("@{}: {}", n.author, n.content.trim()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub struct ContextAggregator {
    seen: Arc<dyn SeenLedger>,
    own_identity: String,
    username: String,
}

impl ContextAggregator {
    pub fn new(seen: Arc<dyn SeenLedger>, own_identity: String, username: String) -> Self {
        Self {
            seen,
            own_identity,
            username,
        }
    }

    /// Build the cycle context.
    ///
    /// A notification is yielded only after it has been durably marked seen.
    /// When marking fails it is left out of this cycle and stays unseen, so a
    /// later cycle picks it up again.
    pub fn aggregate(
        &self,
        recent_posts: Vec<PostRecord>,
        notifications: Vec<Notification>,
    ) -> Context {
        let fetched = notifications.len();
        let mut batch_ids = HashSet::new();
        let mut novel = Vec::new();

        for notification in notifications {
            if notification.author == self.own_identity {
                continue;
            }
            if !batch_ids.insert(notification.external_id.clone()) {
                continue;
            }
            if self.seen.is_seen(&notification.external_id) {
                continue;
            }
            match self.seen.mark_seen(&notification) {
                Ok(true) => novel.push(notification),
                Ok(false) => debug!(
                    external_id = %notification.external_id,
                    "Already consumed, skipping"
                ),
                Err(e) => warn!(
                    external_id = %notification.external_id,
                    "Not consuming notification this cycle: {e:#}"
                ),
            }
        }
        novel.sort_by_key(|n| n.created_at);

        let anchors = recent_posts
            .iter()
            .filter_map(|post| {
                let external_id = post.external_id.clone()?;
                Some(Notification {
                    external_id,
                    author: self.username.clone(),
                    content: post.content.clone(),
                    parent_ref: None,
                    origin: Origin::Own,
                    created_at: u64::try_from(post.created_at).unwrap_or_default(),
                })
            })
            .collect();

        debug!(fetched, novel = novel.len(), "Aggregated context");
        Context {
            novel,
            anchors,
            recent_posts,
        }
    }
}
