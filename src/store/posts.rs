//! Local post log and user lookup.
//!
//! Posts are recorded before they are published; `external_id` is filled in
//! only once the platform accepted the post.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A local user. Posts reference users by id only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}

/// A generated post as recorded locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: i64,
    pub content: String,
    /// Username of the author.
    pub author: String,
    pub created_at: i64,
    /// Platform identifier, set after a successful publish.
    pub external_id: Option<String>,
}

pub struct PostStore {
    conn: Mutex<Connection>,
}

impl PostStore {
    /// Open (or create) `dir/posts.db`.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create data dir: {}", dir.display()))?;
        let db_path = dir.join("posts.db");
        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open posts DB: {}", db_path.display()))?;
        Self::init(conn)
    }

    /// In-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;

             CREATE TABLE IF NOT EXISTS users (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                username   TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL
             );

             CREATE TABLE IF NOT EXISTS posts (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                content     TEXT NOT NULL,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                created_at  INTEGER NOT NULL,
                external_id TEXT
             );
             CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at);",
        )
        .context("failed to create post tables")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Look a user up by name, creating it on first use.
    pub fn user_by_name_or_create(&self, username: &str) -> Result<User> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO users (username, created_at) VALUES (?1, ?2)",
            params![username, now_secs()],
        )?;
        let id = conn.query_row(
            "SELECT id FROM users WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )?;
        Ok(User {
            id,
            username: username.to_string(),
        })
    }

    /// Record a post with no external id yet.
    pub fn insert_post(&self, user: &User, content: &str) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO posts (content, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![content, user.id, now_secs()],
        )
        .context("failed to insert post")?;
        Ok(conn.last_insert_rowid())
    }

    /// Attach the platform identifier after a successful publish.
    pub fn set_external_id(&self, post_id: i64, external_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE posts SET external_id = ?1 WHERE id = ?2",
            params![external_id, post_id],
        )?;
        if updated == 0 {
            anyhow::bail!("post {post_id} does not exist");
        }
        Ok(())
    }

    pub fn get(&self, post_id: i64) -> Result<Option<PostRecord>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT p.id, p.content, u.username, p.created_at, p.external_id
             FROM posts p JOIN users u ON u.id = p.user_id
             WHERE p.id = ?1",
            params![post_id],
            row_to_post,
        )
        .optional()
        .context("failed to load post")
    }

    /// The `limit` most recent posts, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<PostRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT p.id, p.content, u.username, p.created_at, p.external_id
             FROM posts p JOIN users u ON u.id = p.user_id
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT ?1",
        )?;
        let posts = stmt
            .query_map(params![limit as i64], row_to_post)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(posts)
    }
}

fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostRecord> {
    Ok(PostRecord {
        id: row.get(0)?,
        content: row.get(1)?,
        author: row.get(2)?,
        created_at: row.get(3)?,
        external_id: row.get(4)?,
    })
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_lookup_is_idempotent() {
        let store = PostStore::open_in_memory().unwrap();
        let first = store.user_by_name_or_create("snowpost").unwrap();
        let again = store.user_by_name_or_create("snowpost").unwrap();
        let other = store.user_by_name_or_create("someone").unwrap();
        assert_eq!(first, again);
        assert_ne!(first.id, other.id);
    }

    #[test]
    fn post_gets_external_id_after_publish() {
        let store = PostStore::open_in_memory().unwrap();
        let user = store.user_by_name_or_create("snowpost").unwrap();
        let id = store.insert_post(&user, "hello nostr").unwrap();

        let post = store.get(id).unwrap().unwrap();
        assert_eq!(post.external_id, None);
        assert_eq!(post.author, "snowpost");

        store.set_external_id(id, "ev123").unwrap();
        let post = store.get(id).unwrap().unwrap();
        assert_eq!(post.external_id.as_deref(), Some("ev123"));
    }

    #[test]
    fn set_external_id_on_missing_post_fails() {
        let store = PostStore::open_in_memory().unwrap();
        assert!(store.set_external_id(42, "ev").is_err());
    }

    #[test]
    fn recent_is_newest_first_and_limited() {
        let store = PostStore::open_in_memory().unwrap();
        let user = store.user_by_name_or_create("snowpost").unwrap();
        for i in 0..5 {
            store.insert_post(&user, &format!("post {i}")).unwrap();
        }

        let recent = store.recent(3).unwrap();
        let contents: Vec<&str> = recent.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(contents, vec!["post 4", "post 3", "post 2"]);
    }

    #[test]
    fn posts_persist_on_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        {
            let store = PostStore::open(dir.path()).unwrap();
            let user = store.user_by_name_or_create("snowpost").unwrap();
            store.insert_post(&user, "durable").unwrap();
        }
        let store = PostStore::open(dir.path()).unwrap();
        assert_eq!(store.recent(10).unwrap().len(), 1);
    }
}
