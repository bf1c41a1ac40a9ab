//! SQLite document catalog
//!
//! One row per uploaded document. Stored in `<root>/catalog.db`.
//!
//! ## Rules enforced here
//!
//! - `digest` is write-once: a trigger aborts any update that changes a
//!   non-null digest, so no code path can re-baseline a corrupted file.
//! - Rows are only removed through the purge gate on `DocumentVault`.
//! - Every mutation is a single-row statement; the per-document lock in the
//!   callers serializes competing writers for the same id.

use crate::error::{Result, VaultError};
use crate::models::{CatalogEntry, DocumentStatus};
use crate::storage::sqlite::{connect, from_millis, to_millis};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

pub const CATALOG_DB_FILE: &str = "catalog.db";

pub struct CatalogStore {
    pool: SqlitePool,
}

impl CatalogStore {
    /// Open the catalog under `root`, creating the schema if missing.
    pub async fn open(root: &Path) -> Result<Self> {
        let db_path = root.join(CATALOG_DB_FILE);
        info!(path = %db_path.display(), "Initializing document catalog");

        let pool = connect(&db_path, 8).await?;
        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY NOT NULL,
                owner_id TEXT NOT NULL,
                file_name TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                type_tag TEXT NOT NULL,
                digest TEXT,
                local_path TEXT,
                remote_key TEXT,
                created_at INTEGER NOT NULL,
                last_verified_at INTEGER,
                status TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| VaultError::database_error(format!("Failed to create documents table: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents(owner_id)")
            .execute(pool)
            .await
            .map_err(|e| VaultError::database_error(format!("Failed to create index: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status)")
            .execute(pool)
            .await
            .map_err(|e| VaultError::database_error(format!("Failed to create index: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS documents_digest_write_once
            BEFORE UPDATE OF digest ON documents
            WHEN old.digest IS NOT NULL AND new.digest IS NOT old.digest
            BEGIN
                SELECT RAISE(ABORT, 'digest is write-once');
            END
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| VaultError::database_error(format!("Failed to create trigger: {}", e)))?;

        debug!("Catalog schema ready");
        Ok(())
    }

    fn row_to_entry(row: &SqliteRow) -> Result<CatalogEntry> {
        let status: String = row.get("status");
        let size: i64 = row.get("size_bytes");
        let last_verified: Option<i64> = row.get("last_verified_at");
        Ok(CatalogEntry {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            file_name: row.get("file_name"),
            size_bytes: size.max(0) as u64,
            type_tag: row.get("type_tag"),
            digest: row.get("digest"),
            local_path: row.get("local_path"),
            remote_key: row.get("remote_key"),
            created_at: from_millis(row.get("created_at")),
            last_verified_at: last_verified.map(from_millis),
            status: status.parse()?,
        })
    }

    fn rows_to_entries(rows: Vec<SqliteRow>) -> Result<Vec<CatalogEntry>> {
        rows.iter().map(Self::row_to_entry).collect()
    }

    /// Insert a new entry. Fails if the id already exists.
    pub async fn insert(&self, entry: &CatalogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (
                id, owner_id, file_name, size_bytes, type_tag, digest,
                local_path, remote_key, created_at, last_verified_at, status
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.owner_id)
        .bind(&entry.file_name)
        .bind(entry.size_bytes as i64)
        .bind(&entry.type_tag)
        .bind(&entry.digest)
        .bind(&entry.local_path)
        .bind(&entry.remote_key)
        .bind(to_millis(entry.created_at))
        .bind(entry.last_verified_at.map(to_millis))
        .bind(entry.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| VaultError::database_error(format!("Failed to insert document: {}", e)))?;

        debug!(
            document_id = %entry.id,
            owner_id = %entry.owner_id,
            status = %entry.status,
            "Cataloged document"
        );
        Ok(())
    }

    /// Insert that tolerates its own earlier commit: a duplicate id whose
    /// stored row carries the same digest counts as success.
    pub async fn insert_or_confirm(&self, entry: &CatalogEntry) -> Result<()> {
        let Err(insert_error) = self.insert(entry).await else {
            return Ok(());
        };
        match self.get(&entry.id).await {
            Ok(Some(existing)) if existing.digest == entry.digest => {
                debug!(document_id = %entry.id, "Catalog row already committed");
                Ok(())
            }
            _ => Err(insert_error),
        }
    }

    pub async fn get(&self, document_id: &str) -> Result<Option<CatalogEntry>> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| VaultError::database_error(format!("Failed to query document: {}", e)))?;

        row.as_ref().map(Self::row_to_entry).transpose()
    }

    pub async fn list_all(&self) -> Result<Vec<CatalogEntry>> {
        let rows = sqlx::query("SELECT * FROM documents ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VaultError::database_error(format!("Failed to list documents: {}", e)))?;
        Self::rows_to_entries(rows)
    }

    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<CatalogEntry>> {
        let rows = sqlx::query("SELECT * FROM documents WHERE owner_id = ? ORDER BY created_at, id")
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VaultError::database_error(format!("Failed to list documents: {}", e)))?;
        Self::rows_to_entries(rows)
    }

    /// Entries a health scan should inspect: everything except `pending`.
    pub async fn list_scan_candidates(&self, owner_id: Option<&str>) -> Result<Vec<CatalogEntry>> {
        let rows = match owner_id {
            Some(owner) => {
                sqlx::query(
                    "SELECT * FROM documents WHERE status != 'pending' AND owner_id = ? ORDER BY created_at, id",
                )
                .bind(owner)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query("SELECT * FROM documents WHERE status != 'pending' ORDER BY created_at, id")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| VaultError::database_error(format!("Failed to list scan candidates: {}", e)))?;
        Self::rows_to_entries(rows)
    }

    /// Returns false when the id is unknown.
    pub async fn update_status(&self, document_id: &str, status: DocumentStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE documents SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(|e| VaultError::database_error(format!("Failed to update status: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    /// Point the entry at re-verified bytes and mark it recovered.
    pub async fn record_recovery(
        &self,
        document_id: &str,
        local_path: &str,
        verified_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE documents SET local_path = ?, status = ?, last_verified_at = ? WHERE id = ?",
        )
        .bind(local_path)
        .bind(DocumentStatus::Recovered.as_str())
        .bind(to_millis(verified_at))
        .bind(document_id)
        .execute(&self.pool)
        .await
        .map_err(|e| VaultError::database_error(format!("Failed to record recovery: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    /// Attach a remote copy. An `at_risk` entry goes back to `stored`.
    pub async fn record_remote_copy(&self, document_id: &str, remote_key: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET remote_key = ?,
                status = CASE WHEN status = 'at_risk' THEN 'stored' ELSE status END
            WHERE id = ?
            "#,
        )
        .bind(remote_key)
        .bind(document_id)
        .execute(&self.pool)
        .await
        .map_err(|e| VaultError::database_error(format!("Failed to record remote copy: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_verified(&self, document_id: &str, verified_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE documents SET last_verified_at = ? WHERE id = ?")
            .bind(to_millis(verified_at))
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(|e| VaultError::database_error(format!("Failed to mark verified: {}", e)))?;
        Ok(())
    }

    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| VaultError::database_error(format!("Failed to count documents: {}", e)))?;
        Ok(count.max(0) as u64)
    }

    pub async fn count_by_status(&self) -> Result<BTreeMap<String, u64>> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM documents GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VaultError::database_error(format!("Failed to count documents: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let n: i64 = r.get("n");
                (r.get::<String, _>("status"), n.max(0) as u64)
            })
            .collect())
    }

    /// Hard delete. Only reachable through the purge gate.
    pub(crate) async fn delete(&self, document_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(|e| VaultError::database_error(format!("Failed to delete document: {}", e)))?;
        Ok(result.rows_affected() > 0)
    }

    #[cfg(test)]
    pub(crate) async fn force_digest(&self, document_id: &str, digest: &str) -> Result<()> {
        sqlx::query("UPDATE documents SET digest = ? WHERE id = ?")
            .bind(digest)
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
