//! Pattern embeddings stored in SQLite
//!
//! Embeddings are BLOBs of little-endian f32 keyed by pattern id.
//! Similarity is computed in Rust by the search engine.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::Result;

/// Embedding store for one domain
///
/// The connection sits behind a mutex, so writers are serialized and the
/// store can be shared across tasks.
pub struct VectorDB {
    conn: Mutex<Connection>,
}

impl VectorDB {
    /// Open or create database at path
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db = Self {
            conn: Mutex::new(Connection::open(db_path)?),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS embeddings (
                pattern_id TEXT PRIMARY KEY,
                embedding BLOB NOT NULL,
                dimension INTEGER NOT NULL,
                indexed_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS index_meta (
                key TEXT PRIMARY KEY,
                value TEXT
            );
            "#,
        )?;
        Ok(())
    }

    pub fn upsert(&self, pattern_id: &str, embedding: &[f32]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        self.conn.lock().execute(
            r#"
            INSERT INTO embeddings (pattern_id, embedding, dimension, indexed_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(pattern_id) DO UPDATE SET
                embedding = excluded.embedding,
                dimension = excluded.dimension,
                indexed_at = excluded.indexed_at
            "#,
            params![
                pattern_id,
                embedding_to_blob(embedding),
                embedding.len() as i64,
                now
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, pattern_id: &str) -> Result<Option<Vec<f32>>> {
        let blob: Option<Vec<u8>> = self
            .conn
            .lock()
            .query_row(
                "SELECT embedding FROM embeddings WHERE pattern_id = ?1",
                params![pattern_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(blob.map(|b| blob_to_embedding(&b)))
    }

    /// Every stored embedding keyed by pattern id
    pub fn all(&self) -> Result<HashMap<String, Vec<f32>>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT pattern_id, embedding FROM embeddings")?;
        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            Ok((id, blob))
        })?;

        let mut result = HashMap::new();
        for row in rows {
            let (id, blob) = row?;
            result.insert(id, blob_to_embedding(&blob));
        }
        Ok(result)
    }

    /// Remove a pattern's embedding; returns whether one existed
    pub fn delete(&self, pattern_id: &str) -> Result<bool> {
        let removed = self.conn.lock().execute(
            "DELETE FROM embeddings WHERE pattern_id = ?1",
            params![pattern_id],
        )?;
        Ok(removed > 0)
    }

    pub fn clear(&self) -> Result<()> {
        self.conn.lock().execute("DELETE FROM embeddings", [])?;
        Ok(())
    }

    pub fn get_stats(&self) -> Result<IndexStats> {
        let conn = self.conn.lock();
        let embedding_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;
        let last_indexed: Option<i64> = conn
            .query_row("SELECT MAX(indexed_at) FROM embeddings", [], |row| row.get(0))
            .optional()?
            .flatten();

        Ok(IndexStats {
            embedding_count: embedding_count as usize,
            last_indexed,
        })
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO index_meta (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .lock()
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}

#[derive(Debug, Serialize)]
pub struct IndexStats {
    pub embedding_count: usize,
    pub last_indexed: Option<i64>,
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_conversion() {
        let embedding = vec![1.0, -2.5, 3.25, 0.0];
        assert_eq!(blob_to_embedding(&embedding_to_blob(&embedding)), embedding);
    }

    #[test]
    fn test_upsert_get_delete() -> Result<()> {
        let db = VectorDB::open_in_memory()?;
        db.upsert("p1", &[0.1, 0.2])?;
        db.upsert("p2", &[0.3, 0.4])?;
        db.upsert("p1", &[0.5, 0.6])?;

        assert_eq!(db.get("p1")?, Some(vec![0.5, 0.6]));
        assert_eq!(db.all()?.len(), 2);
        assert_eq!(db.get_stats()?.embedding_count, 2);

        assert!(db.delete("p1")?);
        assert!(!db.delete("p1")?);
        assert_eq!(db.get("p1")?, None);
        assert_eq!(db.get_stats()?.embedding_count, 1);
        Ok(())
    }

    #[test]
    fn test_meta_and_clear() -> Result<()> {
        let db = VectorDB::open_in_memory()?;
        assert_eq!(db.get_meta("last_full_index")?, None);
        db.set_meta("last_full_index", "42")?;
        db.set_meta("last_full_index", "43")?;
        assert_eq!(db.get_meta("last_full_index")?.as_deref(), Some("43"));

        db.upsert("p1", &[1.0])?;
        db.clear()?;
        assert!(db.all()?.is_empty());
        assert_eq!(db.get_stats()?.last_indexed, None);
        Ok(())
    }

    #[test]
    fn test_persists_on_disk() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d").join("embeddings.db");
        VectorDB::open(&path)?.upsert("p1", &[1.0, 2.0])?;

        let reopened = VectorDB::open(&path)?;
        assert_eq!(reopened.get("p1")?, Some(vec![1.0, 2.0]));
        Ok(())
    }
}
