//! SQLite-backed metadata catalog.
//!
//! One row per stored file. Every operation is a single statement against
//! the shared pool, so each commits before returning; the catalog is the
//! source of truth for which objects exist, while the blob directory is
//! only ever addressed through paths recorded here.
//!
//! Newest-first orderings tie-break on descending `rowid` so that records
//! created within the same second still come back in a stable, latest-
//! insert-first order.

use crate::models::file_record::FileRecord;
use crate::services::{StorageError, StorageResult};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

/// Metadata operations over the shared SQLite pool.
#[derive(Clone)]
pub struct Catalog {
    db: Arc<SqlitePool>,
}

impl Catalog {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// The underlying pool, exposed for readiness probes.
    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Apply the embedded schema. Idempotent, safe on every startup.
    pub async fn ensure_schema(&self) -> StorageResult<()> {
        let statements = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();
        for stmt in statements {
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    /// Insert one record.
    ///
    /// Fails with `DuplicateId` on a primary-key collision, which the v4
    /// generator makes effectively unreachable.
    pub async fn insert(&self, record: &FileRecord) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO files (id, filename, content_type, size, path, created_at, expires_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id)
        .bind(&record.filename)
        .bind(&record.content_type)
        .bind(record.size)
        .bind(&record.path)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&*self.db)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                StorageError::DuplicateId(record.id)
            } else {
                StorageError::Sqlx(err)
            }
        })?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: Uuid) -> StorageResult<Option<FileRecord>> {
        let record = sqlx::query_as::<_, FileRecord>(
            "SELECT id, filename, content_type, size, path, created_at, expires_at
             FROM files WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(record)
    }

    /// All records carrying `filename`, newest-first.
    pub async fn get_by_name(&self, filename: &str) -> StorageResult<Vec<FileRecord>> {
        let records = sqlx::query_as::<_, FileRecord>(
            "SELECT id, filename, content_type, size, path, created_at, expires_at
             FROM files WHERE filename = ?
             ORDER BY created_at DESC, rowid DESC",
        )
        .bind(filename)
        .fetch_all(&*self.db)
        .await?;
        Ok(records)
    }

    /// The most recently created record carrying `filename`, if any.
    pub async fn get_latest_by_name(&self, filename: &str) -> StorageResult<Option<FileRecord>> {
        let record = sqlx::query_as::<_, FileRecord>(
            "SELECT id, filename, content_type, size, path, created_at, expires_at
             FROM files WHERE filename = ?
             ORDER BY created_at DESC, rowid DESC
             LIMIT 1",
        )
        .bind(filename)
        .fetch_optional(&*self.db)
        .await?;
        Ok(record)
    }

    /// Every record, newest-first.
    pub async fn list_all(&self) -> StorageResult<Vec<FileRecord>> {
        let records = sqlx::query_as::<_, FileRecord>(
            "SELECT id, filename, content_type, size, path, created_at, expires_at
             FROM files
             ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&*self.db)
        .await?;
        Ok(records)
    }

    /// Remove one record, returning the removed row so the caller can
    /// clean up its blob. `None` when the id was not present.
    pub async fn delete_by_id(&self, id: Uuid) -> StorageResult<Option<FileRecord>> {
        let record = sqlx::query_as::<_, FileRecord>(
            "DELETE FROM files WHERE id = ?
             RETURNING id, filename, content_type, size, path, created_at, expires_at",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(record)
    }

    /// Remove every record carrying `filename`, returning the removed rows.
    pub async fn delete_by_name(&self, filename: &str) -> StorageResult<Vec<FileRecord>> {
        let records = sqlx::query_as::<_, FileRecord>(
            "DELETE FROM files WHERE filename = ?
             RETURNING id, filename, content_type, size, path, created_at, expires_at",
        )
        .bind(filename)
        .fetch_all(&*self.db)
        .await?;
        Ok(records)
    }

    /// Records whose expiry is set and has passed as of `now`.
    pub async fn find_expired(&self, now: i64) -> StorageResult<Vec<FileRecord>> {
        let records = sqlx::query_as::<_, FileRecord>(
            "SELECT id, filename, content_type, size, path, created_at, expires_at
             FROM files
             WHERE expires_at IS NOT NULL AND expires_at <= ?",
        )
        .bind(now)
        .fetch_all(&*self.db)
        .await?;
        Ok(records)
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    // A single-connection pool keeps the in-memory database alive and
    // shared across all statements in a test.
    async fn test_catalog() -> Catalog {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        let catalog = Catalog::new(Arc::new(pool));
        catalog.ensure_schema().await.expect("schema");
        catalog
    }

    fn record(filename: &str, created_at: i64, expires_at: Option<i64>) -> FileRecord {
        let id = Uuid::new_v4();
        FileRecord {
            id,
            filename: filename.to_string(),
            content_type: Some("text/plain".to_string()),
            size: 3,
            path: format!("/tmp/blobs/{}", id),
            created_at,
            expires_at,
        }
    }

    #[tokio::test]
    async fn insert_then_get_by_id() {
        let catalog = test_catalog().await;
        let rec = record("notes.txt", 100, None);
        catalog.insert(&rec).await.expect("insert");

        let found = catalog
            .get_by_id(rec.id)
            .await
            .expect("get")
            .expect("present");
        assert_eq!(found.id, rec.id);
        assert_eq!(found.filename, "notes.txt");
        assert_eq!(found.content_type.as_deref(), Some("text/plain"));
        assert_eq!(found.size, 3);
        assert_eq!(found.path, rec.path);
        assert_eq!(found.created_at, 100);
        assert_eq!(found.expires_at, None);
    }

    #[tokio::test]
    async fn unknown_id_is_absent() {
        let catalog = test_catalog().await;
        let found = catalog.get_by_id(Uuid::new_v4()).await.expect("get");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let catalog = test_catalog().await;
        let rec = record("dup.bin", 100, None);
        catalog.insert(&rec).await.expect("first insert");

        let err = catalog.insert(&rec).await.expect_err("second insert");
        assert!(matches!(err, StorageError::DuplicateId(id) if id == rec.id));
    }

    #[tokio::test]
    async fn by_name_is_newest_first_with_stable_tiebreak() {
        let catalog = test_catalog().await;
        let a = record("report.pdf", 100, None);
        let b = record("report.pdf", 200, None);
        let c = record("report.pdf", 200, None); // same second as b, inserted later
        let other = record("other.pdf", 300, None);
        for rec in [&a, &b, &c, &other] {
            catalog.insert(rec).await.expect("insert");
        }

        let matches = catalog.get_by_name("report.pdf").await.expect("by name");
        let ids: Vec<Uuid> = matches.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![c.id, b.id, a.id]);

        let latest = catalog
            .get_latest_by_name("report.pdf")
            .await
            .expect("latest")
            .expect("present");
        assert_eq!(latest.id, c.id);
    }

    #[tokio::test]
    async fn list_all_is_newest_first() {
        let catalog = test_catalog().await;
        let a = record("a.txt", 100, None);
        let b = record("b.txt", 300, None);
        let c = record("c.txt", 200, None);
        for rec in [&a, &b, &c] {
            catalog.insert(rec).await.expect("insert");
        }

        let all = catalog.list_all().await.expect("list");
        let ids: Vec<Uuid> = all.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![b.id, c.id, a.id]);
    }

    #[tokio::test]
    async fn delete_by_id_returns_the_row_exactly_once() {
        let catalog = test_catalog().await;
        let rec = record("gone.txt", 100, None);
        catalog.insert(&rec).await.expect("insert");

        let removed = catalog.delete_by_id(rec.id).await.expect("delete");
        assert_eq!(removed.expect("present").path, rec.path);

        let again = catalog.delete_by_id(rec.id).await.expect("second delete");
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn delete_by_name_removes_all_matches() {
        let catalog = test_catalog().await;
        let a = record("logs.gz", 100, None);
        let b = record("logs.gz", 200, None);
        let keeper = record("keep.txt", 150, None);
        for rec in [&a, &b, &keeper] {
            catalog.insert(rec).await.expect("insert");
        }

        let removed = catalog.delete_by_name("logs.gz").await.expect("delete");
        assert_eq!(removed.len(), 2);

        let all = catalog.list_all().await.expect("list");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, keeper.id);
    }

    #[tokio::test]
    async fn find_expired_selects_only_past_deadlines() {
        let catalog = test_catalog().await;
        let expired = record("old.txt", 100, Some(500));
        let on_deadline = record("edge.txt", 100, Some(1000));
        let future = record("fresh.txt", 100, Some(2000));
        let forever = record("forever.txt", 100, None);
        for rec in [&expired, &on_deadline, &future, &forever] {
            catalog.insert(rec).await.expect("insert");
        }

        let hits = catalog.find_expired(1000).await.expect("find");
        let mut ids: Vec<Uuid> = hits.iter().map(|r| r.id).collect();
        ids.sort();
        let mut want = vec![expired.id, on_deadline.id];
        want.sort();
        assert_eq!(ids, want);
    }
}
