//! Social memory: which identities the follow decision has already judged.
//!
//! The free functions take `&Connection`; [`IdentityStore`] owns a connection
//! for the pipeline.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

// ── Data structures ──────────────────────────────────────────────

/// The outcome of evaluating one identity for a follow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityEvaluation {
    pub identity: String,
    pub score: f64,
    pub followed: bool,
    pub evaluated_at: i64,
}

// ── Schema ───────────────────────────────────────────────────────

pub fn create_identity_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS identities (
            identity     TEXT PRIMARY KEY,
            score        REAL NOT NULL,
            followed     INTEGER NOT NULL DEFAULT 0,
            evaluated_at INTEGER NOT NULL
        );",
    )
    .context("failed to create identity tables")?;
    Ok(())
}

// ── CRUD operations ──────────────────────────────────────────────

/// Insert or replace the evaluation for an identity. A follow is sticky.
pub fn upsert_evaluation(conn: &Connection, eval: &IdentityEvaluation) -> Result<()> {
    conn.execute(
        "INSERT INTO identities (identity, score, followed, evaluated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(identity) DO UPDATE SET
            score = excluded.score,
            followed = MAX(identities.followed, excluded.followed),
            evaluated_at = excluded.evaluated_at",
        params![
            eval.identity,
            eval.score,
            eval.followed as i32,
            eval.evaluated_at
        ],
    )?;
    debug!(identity = %eval.identity, score = eval.score, followed = eval.followed, "Recorded identity evaluation");
    Ok(())
}

pub fn get_evaluation(conn: &Connection, identity: &str) -> Result<Option<IdentityEvaluation>> {
    conn.query_row(
        "SELECT identity, score, followed, evaluated_at FROM identities WHERE identity = ?1",
        params![identity],
        |row| {
            Ok(IdentityEvaluation {
                identity: row.get(0)?,
                score: row.get(1)?,
                followed: row.get::<_, i32>(2)? != 0,
                evaluated_at: row.get(3)?,
            })
        },
    )
    .optional()
    .context("failed to load identity evaluation")
}

// ── Store ────────────────────────────────────────────────────────

pub struct IdentityStore {
    conn: Mutex<Connection>,
}

impl IdentityStore {
    /// Open (or create) `dir/social.db`.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create data dir: {}", dir.display()))?;
        let db_path = dir.join("social.db");
        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open social DB: {}", db_path.display()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        create_identity_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        create_identity_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Whether the identity has been evaluated before.
    pub fn is_known(&self, identity: &str) -> Result<bool> {
        Ok(get_evaluation(&self.conn.lock(), identity)?.is_some())
    }

    pub fn record_evaluation(&self, identity: &str, score: f64, followed: bool) -> Result<()> {
        let eval = IdentityEvaluation {
            identity: identity.to_string(),
            score,
            followed,
            evaluated_at: chrono::Utc::now().timestamp(),
        };
        upsert_evaluation(&self.conn.lock(), &eval)
    }

    pub fn evaluation(&self, identity: &str) -> Result<Option<IdentityEvaluation>> {
        get_evaluation(&self.conn.lock(), identity)
    }
}
