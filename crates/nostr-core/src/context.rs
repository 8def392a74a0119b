//! Notification model and reply-thread reconstruction.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Where a notification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// A note replying to something (carries a parent reference).
    Reply,
    /// A note from someone we follow.
    Timeline,
    /// A note that tags us without replying to anything.
    Mention,
    /// One of our own published posts, used only to anchor reply threads.
    Own,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Reply => "reply",
            Origin::Timeline => "timeline",
            Origin::Mention => "mention",
            Origin::Own => "own",
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A platform notification normalized away from relay events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Opaque platform identifier (event id hex on Nostr).
    pub external_id: String,
    /// Author identity (npub on Nostr).
    pub author: String,
    pub content: String,
    /// External id of the item this one replies to, if any.
    pub parent_ref: Option<String>,
    pub origin: Origin,
    /// Unix seconds.
    pub created_at: u64,
}

/// One item of a reconstructed thread.
#[derive(Debug, Clone)]
pub struct ThreadEntry<'a> {
    pub item: &'a Notification,
    /// Author of the in-thread item this one replies to.
    pub replying_to: Option<&'a str>,
}

/// A connected reply chain, oldest item first.
#[derive(Debug, Clone)]
pub struct Thread<'a> {
    pub entries: Vec<ThreadEntry<'a>>,
}

impl Thread<'_> {
    /// Render the thread as one line per item, replies indented.
    pub fn render_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let item = entry.item;
                let indent = if i == 0 { "" } else { "  " };
                let mut line = format!(
                    "{indent}[{}] {} @{}: {}",
                    item.origin,
                    format_timestamp(item.created_at),
                    truncate_npub(&item.author),
                    item.content.trim()
                );
                if let Some(parent_author) = entry.replying_to {
                    line.push_str(&format!(" (replying to @{})", truncate_npub(parent_author)));
                }
                line
            })
            .collect()
    }

    /// Whether the thread holds anything besides our own posts.
    pub fn has_foreign_items(&self) -> bool {
        self.entries.iter().any(|e| e.item.origin != Origin::Own)
    }
}

/// Group items into independent reply chains.
///
/// An item roots a chain when it has no parent reference or its parent is
/// not in `items`. Parent cycles are broken at the member with the lowest
/// input index. Repeated external ids keep their first occurrence. Chains
/// made only of [`Origin::Own`] anchors are dropped.
pub fn reconstruct_threads(items: &[Notification]) -> Vec<Thread<'_>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    for (i, item) in items.iter().enumerate() {
        index.entry(item.external_id.as_str()).or_insert(i);
    }

    let parent_of = |i: usize| -> Option<usize> {
        items[i]
            .parent_ref
            .as_deref()
            .and_then(|p| index.get(p).copied())
            .filter(|&p| p != i)
    };

    let mut chains: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..items.len() {
        if index.get(items[i].external_id.as_str()) != Some(&i) {
            continue;
        }
        chains.entry(find_root(i, &parent_of)).or_default().push(i);
    }

    let mut threads: Vec<(u64, usize, Thread<'_>)> = chains
        .into_iter()
        .map(|(root, mut members)| {
            members.sort_by_key(|&i| (i != root, items[i].created_at, i));
            let oldest = members
                .iter()
                .map(|&i| items[i].created_at)
                .min()
                .unwrap_or_default();
            let entries = members
                .iter()
                .map(|&i| ThreadEntry {
                    item: &items[i],
                    replying_to: if i == root {
                        None
                    } else {
                        parent_of(i).map(|p| items[p].author.as_str())
                    },
                })
                .collect();
            (oldest, root, Thread { entries })
        })
        .filter(|(_, _, thread)| thread.has_foreign_items())
        .collect();

    threads.sort_by_key(|(oldest, root, _)| (*oldest, *root));
    threads.into_iter().map(|(_, _, thread)| thread).collect()
}

fn find_root(start: usize, parent_of: &impl Fn(usize) -> Option<usize>) -> usize {
    let mut path = vec![start];
    let mut current = start;
    while let Some(parent) = parent_of(current) {
        if let Some(pos) = path.iter().position(|&seen| seen == parent) {
            return path[pos..].iter().copied().min().unwrap_or(parent);
        }
        path.push(parent);
        current = parent;
    }
    current
}

/// Render threads as a block of text, threads separated by a blank line.
pub fn render_threads(threads: &[Thread<'_>]) -> String {
    threads
        .iter()
        .map(|t| t.render_lines().join("\n"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Format unix seconds as `YYYY-MM-DD HH:MM` (UTC).
pub fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| chrono::DateTime::from_timestamp(s, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| secs.to_string())
}

/// Truncate npub for compact display (first 12 chars after 'npub1').
pub fn truncate_npub(npub: &str) -> &str {
    if npub.starts_with("npub1") && npub.len() > 17 {
        &npub[..17]
    } else {
        npub
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: &str, author: &str, parent: Option<&str>, created_at: u64) -> Notification {
        Notification {
            external_id: id.to_string(),
            author: author.to_string(),
            content: format!("content of {id}"),
            parent_ref: parent.map(str::to_string),
            origin: if parent.is_some() {
                Origin::Reply
            } else {
                Origin::Mention
            },
            created_at,
        }
    }

    fn ids<'a>(thread: &Thread<'a>) -> Vec<&'a str> {
        thread
            .entries
            .iter()
            .map(|e| e.item.external_id.as_str())
            .collect()
    }

    #[test]
    fn chains_are_grouped_and_ordered_oldest_first() {
        let items = vec![
            note("c", "carol", Some("b"), 30),
            note("a", "alice", None, 10),
            note("x", "xavier", None, 15),
            note("b", "bob", Some("a"), 20),
        ];

        let threads = reconstruct_threads(&items);
        assert_eq!(threads.len(), 2);
        assert_eq!(ids(&threads[0]), vec!["a", "b", "c"]);
        assert_eq!(ids(&threads[1]), vec!["x"]);

        assert_eq!(threads[0].entries[0].replying_to, None);
        assert_eq!(threads[0].entries[1].replying_to, Some("alice"));
        assert_eq!(threads[0].entries[2].replying_to, Some("bob"));
    }

    #[test]
    fn unknown_parent_makes_a_root() {
        let items = vec![note("r", "rita", Some("elsewhere"), 5)];
        let threads = reconstruct_threads(&items);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].entries[0].replying_to, None);
    }

    #[test]
    fn parent_cycle_is_broken_at_lowest_index() {
        let items = vec![
            note("p", "pat", Some("q"), 2),
            note("q", "quinn", Some("p"), 1),
        ];
        let threads = reconstruct_threads(&items);
        assert_eq!(threads.len(), 1);
        assert_eq!(ids(&threads[0]), vec!["p", "q"]);
        assert_eq!(threads[0].entries[1].replying_to, Some("pat"));
    }

    #[test]
    fn duplicate_ids_keep_first() {
        let items = vec![note("a", "alice", None, 1), note("a", "alice", None, 1)];
        let threads = reconstruct_threads(&items);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].entries.len(), 1);
    }

    #[test]
    fn own_anchor_roots_replies_but_alone_is_dropped() {
        let mut anchor = note("mine", "me", None, 1);
        anchor.origin = Origin::Own;
        let mut lonely = note("old", "me", None, 0);
        lonely.origin = Origin::Own;

        let items = vec![lonely, anchor, note("r", "rob", Some("mine"), 5)];
        let threads = reconstruct_threads(&items);
        assert_eq!(threads.len(), 1);
        assert_eq!(ids(&threads[0]), vec!["mine", "r"]);
        assert_eq!(threads[0].entries[1].replying_to, Some("me"));
    }

    #[test]
    fn render_annotates_replies() {
        let items = vec![note("a", "alice", None, 0), note("b", "bob", Some("a"), 60)];
        let rendered = render_threads(&reconstruct_threads(&items));
        assert_eq!(
            rendered,
            "[mention] 1970-01-01 00:00 @alice: content of a\n  \
             [reply] 1970-01-01 00:01 @bob: content of b (replying to @alice)"
        );
    }

    #[test]
    fn truncate_npub_short_and_long() {
        assert_eq!(truncate_npub("alice"), "alice");
        assert_eq!(
            truncate_npub("npub1abcdefghijklmnopqrstuvwxyz"),
            "npub1abcdefghijkl"
        );
    }
}
