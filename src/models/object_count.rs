//! Cached object counts
//!
//! Content-addressed: rows are keyed by the SHA-256 hex digest of the image
//! bytes, so re-submitting the same photo skips the vision model.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;
use super::ObjectCount;

/// A cached vision count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedCount {
    pub image_sha256: String,
    pub object_type: String,
    pub count: u32,
    pub model: String,
    pub created_at: String,
}

impl CachedCount {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            image_sha256: row.get("image_sha256")?,
            object_type: row.get("object_type")?,
            count: row.get("count")?,
            model: row.get("model")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn as_object_count(&self) -> ObjectCount {
        ObjectCount {
            object_type: self.object_type.clone(),
            count: self.count,
        }
    }

    pub fn get(conn: &Connection, image_sha256: &str) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM object_counts WHERE image_sha256 = ?1")?;

        match stmt.query_row([image_sha256], Self::from_row) {
            Ok(cached) => Ok(Some(cached)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Insert or replace the count for an image
    pub fn upsert(conn: &Connection, image_sha256: &str, count: &ObjectCount, model: &str) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO object_counts (image_sha256, object_type, count, model)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(image_sha256) DO UPDATE SET
                object_type = excluded.object_type,
                count = excluded.count,
                model = excluded.model,
                created_at = datetime('now')
            "#,
            params![image_sha256, count.object_type, count.count, model],
        )?;

        Self::get(conn, image_sha256)?.ok_or_else(|| {
            crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows)
        })
    }

    /// Remove every cached count, returning how many were removed
    pub fn clear(conn: &Connection) -> DbResult<usize> {
        Ok(conn.execute("DELETE FROM object_counts", [])?)
    }

    pub fn stats(conn: &Connection) -> DbResult<CountCacheStats> {
        let stats = conn.query_row(
            "SELECT COUNT(*), MIN(created_at), MAX(created_at) FROM object_counts",
            [],
            |row| {
                Ok(CountCacheStats {
                    entry_count: row.get(0)?,
                    oldest_entry: row.get(1)?,
                    newest_entry: row.get(2)?,
                })
            },
        )?;
        Ok(stats)
    }
}

/// Count cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CountCacheStats {
    pub entry_count: i64,
    pub oldest_entry: Option<String>,
    pub newest_entry: Option<String>,
}
