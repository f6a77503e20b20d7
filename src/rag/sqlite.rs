//! SQLite-backed fragment store.
//!
//! The persistent backend used by the native host process. Fragments and
//! their embeddings round-trip through the `fragments` table, but ranking
//! is delegated to an FTS5 index kept in sync by triggers: this backend
//! reports `supports_vector_search() == false` and serves keyword matches
//! instead of cosine scores. Embedding blobs are still persisted so a
//! later migration to a vector-capable backend does not re-embed.

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::DocumentStore;
use super::types::{Fragment, SourceType};
use crate::core::errors::RagError;

pub struct SqliteStore {
    pool: SqlitePool,
    #[allow(dead_code)]
    db_path: PathBuf,
}

impl SqliteStore {
    pub async fn with_path(db_path: PathBuf) -> Result<Self, RagError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(RagError::storage)?;

        let store = Self { pool, db_path };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), RagError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS fragments (
                id TEXT PRIMARY KEY,
                source_type TEXT NOT NULL,
                source_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL DEFAULT 0,
                text TEXT NOT NULL,
                metadata TEXT,
                embedding BLOB,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::storage)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_fragments_source ON fragments(source_id)")
            .execute(&self.pool)
            .await
            .map_err(RagError::storage)?;

        sqlx::query(
            "CREATE VIRTUAL TABLE IF NOT EXISTS fragments_fts
             USING fts5(text, content='fragments', content_rowid='rowid')",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::storage)?;

        // Keep the external-content FTS index in lockstep with the base
        // table. `put` upserts via ON CONFLICT DO UPDATE specifically so
        // the update trigger fires (REPLACE would skip the delete hook).
        for trigger in [
            "CREATE TRIGGER IF NOT EXISTS fragments_ai AFTER INSERT ON fragments BEGIN
                INSERT INTO fragments_fts(rowid, text) VALUES (new.rowid, new.text);
             END",
            "CREATE TRIGGER IF NOT EXISTS fragments_ad AFTER DELETE ON fragments BEGIN
                INSERT INTO fragments_fts(fragments_fts, rowid, text)
                VALUES ('delete', old.rowid, old.text);
             END",
            "CREATE TRIGGER IF NOT EXISTS fragments_au AFTER UPDATE ON fragments BEGIN
                INSERT INTO fragments_fts(fragments_fts, rowid, text)
                VALUES ('delete', old.rowid, old.text);
                INSERT INTO fragments_fts(rowid, text) VALUES (new.rowid, new.text);
             END",
        ] {
            sqlx::query(trigger)
                .execute(&self.pool)
                .await
                .map_err(RagError::storage)?;
        }

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn row_to_fragment(row: &sqlx::sqlite::SqliteRow) -> Result<Fragment, RagError> {
        let source_type: String = row.get("source_type");
        let source_type = SourceType::parse(&source_type)
            .ok_or_else(|| RagError::Storage(format!("unknown source type: {source_type}")))?;

        let metadata: Option<String> = row.get("metadata");
        let metadata = metadata.and_then(|raw| serde_json::from_str(&raw).ok());

        let chunk_index: i64 = row.get("chunk_index");

        Ok(Fragment {
            id: row.get("id"),
            source_type,
            source_id: row.get("source_id"),
            text: row.get("text"),
            chunk_index: chunk_index as u32,
            metadata,
        })
    }

    async fn stored_dimensions(&self) -> Result<Option<usize>, RagError> {
        let bytes: Option<i64> = sqlx::query_scalar(
            "SELECT LENGTH(embedding) FROM fragments WHERE embedding IS NOT NULL LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(RagError::storage)?;

        Ok(bytes.map(|b| b as usize / 4))
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn put(&self, fragment: Fragment, embedding: Vec<f32>) -> Result<(), RagError> {
        if let Some(expected) = self.stored_dimensions().await? {
            if expected != embedding.len() {
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
        }

        let blob = Self::serialize_embedding(&embedding);
        let metadata = fragment
            .metadata
            .as_ref()
            .map(|m| serde_json::to_string(m).unwrap_or_else(|_| "{}".to_string()));

        sqlx::query(
            "INSERT INTO fragments (id, source_type, source_id, chunk_index, text, metadata, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                source_type = excluded.source_type,
                source_id = excluded.source_id,
                chunk_index = excluded.chunk_index,
                text = excluded.text,
                metadata = excluded.metadata,
                embedding = excluded.embedding",
        )
        .bind(&fragment.id)
        .bind(fragment.source_type.as_str())
        .bind(&fragment.source_id)
        .bind(fragment.chunk_index as i64)
        .bind(&fragment.text)
        .bind(&metadata)
        .bind(&blob)
        .execute(&self.pool)
        .await
        .map_err(RagError::storage)?;

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Fragment>, RagError> {
        let row = sqlx::query(
            "SELECT id, source_type, source_id, chunk_index, text, metadata
             FROM fragments
             WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RagError::storage)?;

        row.as_ref().map(Self::row_to_fragment).transpose()
    }

    async fn all(&self) -> Result<Vec<(Fragment, Vec<f32>)>, RagError> {
        let rows = sqlx::query(
            "SELECT id, source_type, source_id, chunk_index, text, metadata, embedding
             FROM fragments
             WHERE embedding IS NOT NULL
             ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::storage)?;

        let mut pairs = Vec::with_capacity(rows.len());
        for row in &rows {
            let fragment = Self::row_to_fragment(row)?;
            let bytes: Vec<u8> = row.get("embedding");
            pairs.push((fragment, Self::deserialize_embedding(&bytes)));
        }
        Ok(pairs)
    }

    async fn delete_by_source(&self, source_id: &str) -> Result<usize, RagError> {
        let result = sqlx::query("DELETE FROM fragments WHERE source_id = ?1")
            .bind(source_id)
            .execute(&self.pool)
            .await
            .map_err(RagError::storage)?;

        Ok(result.rows_affected() as usize)
    }

    async fn count(&self) -> Result<usize, RagError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fragments")
            .fetch_one(&self.pool)
            .await
            .map_err(RagError::storage)?;

        Ok(count as usize)
    }

    fn supports_vector_search(&self) -> bool {
        false
    }

    async fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<Fragment>, RagError> {
        let match_expr = fts_match_expression(query);
        if match_expr.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT f.id, f.source_type, f.source_id, f.chunk_index, f.text, f.metadata
             FROM fragments_fts
             JOIN fragments f ON f.rowid = fragments_fts.rowid
             WHERE fragments_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2",
        )
        .bind(&match_expr)
        .bind(limit.max(1) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::storage)?;

        rows.iter().map(Self::row_to_fragment).collect()
    }
}

/// Quote each term so user input cannot inject FTS5 operators; terms are
/// OR-ed because a fallback path should favor recall over precision.
fn fts_match_expression(query: &str) -> String {
    query
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}
