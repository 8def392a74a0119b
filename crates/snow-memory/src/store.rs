//! Append-only SQLite store for long-term memories.

use crate::error::MemoryError;
use crate::ranking::{rank_memories, validate_embedding};
use crate::types::{clamp_significance, MemoryRecord, RankedMemory};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite-backed long-term memory log.
///
/// Records are only ever inserted. Embeddings are stored as JSON arrays and
/// must all share the store's fixed dimension.
pub struct SqliteMemoryStore {
    conn: Mutex<Connection>,
    dimension: usize,
}

impl SqliteMemoryStore {
    /// Open or create a memory database.
    ///
    /// Fails if the database already holds embeddings of a different
    /// dimension than `dimension`.
    pub fn open(path: &Path, dimension: usize) -> Result<Self, MemoryError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS memories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content TEXT NOT NULL,
                embedding TEXT NOT NULL,
                significance REAL NOT NULL,
                created_at INTEGER NOT NULL
            );",
        )?;

        let existing: Option<String> = conn
            .query_row("SELECT embedding FROM memories LIMIT 1", [], |row| row.get(0))
            .optional()?;
        if let Some(json) = existing {
            let sample: Vec<f32> = serde_json::from_str(&json)?;
            if sample.len() != dimension {
                return Err(MemoryError::DimensionMismatch {
                    expected: dimension,
                    actual: sample.len(),
                });
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
            dimension,
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory(dimension: usize) -> Result<Self, MemoryError> {
        Self::open(Path::new(":memory:"), dimension)
    }

    /// Fixed embedding dimension of this store.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<(), MemoryError> {
        if embedding.len() != self.dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        validate_embedding(embedding)
    }

    /// Append a memory. Significance is clamped into [1, 10].
    pub fn store(
        &self,
        content: &str,
        embedding: &[f32],
        significance: f64,
    ) -> Result<i64, MemoryError> {
        self.check_dimension(embedding)?;
        let significance = clamp_significance(significance);
        let embedding_json = serde_json::to_string(embedding)?;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO memories (content, embedding, significance, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![content, embedding_json, significance, now_secs()],
        )?;
        let id = conn.last_insert_rowid();
        log::debug!("stored memory {id} (significance {significance})");
        Ok(id)
    }

    /// Every stored memory, oldest first.
    pub fn all(&self) -> Result<Vec<MemoryRecord>, MemoryError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, content, embedding, significance, created_at
             FROM memories ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, content, embedding_json, significance, created_at) = row?;
            records.push(MemoryRecord {
                id,
                content,
                embedding: serde_json::from_str(&embedding_json)?,
                significance,
                created_at,
            });
        }
        Ok(records)
    }

    /// Recall the `k` memories most similar to `query`.
    pub fn rank(&self, query: &[f32], k: usize) -> Result<Vec<RankedMemory>, MemoryError> {
        self.check_dimension(query)?;
        let records = self.all()?;
        rank_memories(query, &records, k)
    }

    /// Count stored memories.
    pub fn count(&self) -> Result<usize, MemoryError> {
        let conn = self.conn.lock();
        let count = conn.query_row("SELECT COUNT(*) FROM memories", [], |row| {
            row.get::<_, i64>(0)
        })?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
