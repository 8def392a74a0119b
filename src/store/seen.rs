//! Persistent seen-notification store backed by SQLite.
//!
//! Tracks which notification ids have already been consumed by a cycle, so
//! later cycles and restarts never treat them as new again.

use anyhow::{Context, Result};
use lru::LruCache;
use nostr_core::Notification;
use parking_lot::Mutex as SyncMutex;
use rusqlite::{params, Connection};
use std::num::NonZeroUsize;
use std::path::Path;

/// Default LRU cache capacity for seen notification ids.
const SEEN_CACHE_CAPACITY: usize = 2000;

/// Number of days of seen notifications to load on startup.
const STARTUP_LOAD_DAYS: u64 = 3;

/// Membership checks and durable inserts for consumed notifications.
pub trait SeenLedger: Send + Sync {
    /// Fast pre-check. Read failures count as unseen; `mark_seen` decides.
    fn is_seen(&self, external_id: &str) -> bool;

    /// Durably record `notification` as consumed. Returns `false` when it was
    /// already recorded, so the insert doubles as an atomic check-and-set.
    fn mark_seen(&self, notification: &Notification) -> Result<bool>;
}

/// Notification deduplication with an in-memory LRU cache in front of SQLite.
pub struct SeenNotificationStore {
    conn: SyncMutex<Connection>,
    cache: SyncMutex<LruCache<String, ()>>,
}

impl SeenNotificationStore {
    /// Open (or create) the database at `dir/seen_notifications.db`.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create data dir: {}", dir.display()))?;

        let db_path = dir.join("seen_notifications.db");
        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open seen-notifications DB: {}", db_path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;",
        )?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS seen_notifications (
                external_id  TEXT PRIMARY KEY,
                origin       TEXT NOT NULL,
                author       TEXT NOT NULL,
                processed_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_seen_processed_at
                ON seen_notifications(processed_at);",
        )?;

        let capacity = NonZeroUsize::new(SEEN_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            conn: SyncMutex::new(conn),
            cache: SyncMutex::new(LruCache::new(capacity)),
        })
    }

    /// Load recently seen ids (last few days) into the LRU cache.
    pub fn load_recent(&self) -> Result<usize> {
        let cutoff = now_secs().saturating_sub(STARTUP_LOAD_DAYS * 86400);

        let ids: Vec<String> = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(
                "SELECT external_id FROM seen_notifications WHERE processed_at >= ?1",
            )?;
            let ids = stmt
                .query_map(params![cutoff as i64], |row| row.get(0))?
                .filter_map(|r| r.ok())
                .collect();
            ids
        };

        let count = ids.len();
        let mut cache = self.cache.lock();
        for id in ids {
            cache.put(id, ());
        }
        tracing::info!("Loaded {count} seen notification ids from SQLite");
        Ok(count)
    }

    /// Total number of consumed notifications.
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM seen_notifications", [], |r| r.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

impl SeenLedger for SeenNotificationStore {
    fn is_seen(&self, external_id: &str) -> bool {
        if self.cache.lock().contains(external_id) {
            return true;
        }

        let found = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT 1 FROM seen_notifications WHERE external_id = ?1",
                params![external_id],
                |_| Ok(true),
            )
            .unwrap_or(false)
        };

        if found {
            self.cache.lock().put(external_id.to_string(), ());
        }
        found
    }

    fn mark_seen(&self, notification: &Notification) -> Result<bool> {
        let inserted = {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT OR IGNORE INTO seen_notifications (external_id, origin, author, processed_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    notification.external_id,
                    notification.origin.as_str(),
                    notification.author,
                    now_secs() as i64
                ],
            )
            .with_context(|| {
                format!(
                    "Failed to persist seen notification {}",
                    notification.external_id.chars().take(8).collect::<String>()
                )
            })?
        };

        // Only cache after the durable write succeeded.
        self.cache
            .lock()
            .put(notification.external_id.clone(), ());
        Ok(inserted == 1)
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr_core::Origin;
    use tempfile::TempDir;

    fn test_store() -> (SeenNotificationStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SeenNotificationStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn notification(id: &str) -> Notification {
        Notification {
            external_id: id.to_string(),
            author: "npub1sender".to_string(),
            content: "gm".to_string(),
            parent_ref: None,
            origin: Origin::Mention,
            created_at: 1_700_000_000,
        }
    }

    #[test]
    fn mark_and_check_seen() {
        let (store, _dir) = test_store();

        assert!(!store.is_seen("abc123"));
        assert!(store.mark_seen(&notification("abc123")).unwrap());
        assert!(store.is_seen("abc123"));
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let (store, _dir) = test_store();

        assert!(store.mark_seen(&notification("abc123")).unwrap());
        assert!(!store.mark_seen(&notification("abc123")).unwrap());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn seen_survives_reopen_without_cache() {
        let dir = TempDir::new().unwrap();
        {
            let store = SeenNotificationStore::open(dir.path()).unwrap();
            store.mark_seen(&notification("persistent")).unwrap();
        }

        let store = SeenNotificationStore::open(dir.path()).unwrap();
        assert!(!store.cache.lock().contains("persistent"));
        assert!(store.is_seen("persistent"));
        assert!(store.cache.lock().contains("persistent"));
    }

    #[test]
    fn load_recent_populates_cache() {
        let dir = TempDir::new().unwrap();
        {
            let store = SeenNotificationStore::open(dir.path()).unwrap();
            store.mark_seen(&notification("recent")).unwrap();
        }

        let store = SeenNotificationStore::open(dir.path()).unwrap();
        assert_eq!(store.load_recent().unwrap(), 1);
        assert!(store.cache.lock().contains("recent"));
    }

    #[test]
    fn failed_write_is_reported_and_not_cached() {
        let (store, _dir) = test_store();
        store
            .conn
            .lock()
            .execute_batch("DROP TABLE seen_notifications;")
            .unwrap();

        assert!(store.mark_seen(&notification("lost")).is_err());
        assert!(!store.cache.lock().contains("lost"));
    }

    #[test]
    fn write_error_names_a_multibyte_id_without_panicking() {
        let (store, _dir) = test_store();
        store
            .conn
            .lock()
            .execute_batch("DROP TABLE seen_notifications;")
            .unwrap();

        let err = store.mark_seen(&notification("ñ☃ñ☃ñ☃ñ☃ñ☃")).unwrap_err();
        assert!(err.to_string().ends_with("ñ☃ñ☃ñ☃ñ☃"));
    }
}
