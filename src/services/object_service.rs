//! ObjectService — the public storage operations.
//!
//! Composes the blob store and catalog into the sequences the API needs
//! and runs the expiration sweep ahead of every operation. Two ordering
//! rules keep the pair consistent:
//!
//! - uploads write the blob before inserting the row, so a crash in the
//!   gap leaves at most an orphan blob, never a row without bytes;
//! - deletes remove the row before the blob, so the object vanishes from
//!   the catalog's view first and a failed file removal only leaks bytes.

use crate::models::file_record::FileRecord;
use crate::services::blob_store::BlobStore;
use crate::services::catalog::Catalog;
use crate::services::reaper;
use crate::services::{StorageError, StorageResult};
use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use std::io::{self, ErrorKind};
use tokio::fs::File;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ObjectService {
    catalog: Catalog,
    blobs: BlobStore,
}

impl ObjectService {
    pub fn new(catalog: Catalog, blobs: BlobStore) -> Self {
        Self { catalog, blobs }
    }

    /// The metadata catalog, exposed for readiness probes.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The blob store, exposed for readiness probes.
    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Reap everything past its deadline. Catalog failures propagate;
    /// individual blob removals inside the sweep are best-effort.
    async fn sweep_expired(&self) -> StorageResult<()> {
        reaper::sweep(&self.catalog, &self.blobs, Utc::now().timestamp()).await?;
        Ok(())
    }

    /// Store a new object and return its record.
    ///
    /// `ttl_seconds` must be absent or strictly positive, and small enough
    /// that `created_at + ttl` fits an epoch timestamp; both are checked
    /// before any byte is written so a bad request leaves no trace. On a
    /// failed insert the freshly written blob is removed again.
    pub async fn upload<S>(
        &self,
        stream: S,
        filename: &str,
        content_type: Option<String>,
        ttl_seconds: Option<i64>,
    ) -> StorageResult<FileRecord>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        if let Some(ttl) = ttl_seconds {
            if ttl <= 0 {
                return Err(StorageError::InvalidTtl);
            }
        }
        self.sweep_expired().await?;

        let created_at = Utc::now().timestamp();
        let expires_at = match ttl_seconds {
            Some(ttl) => Some(
                created_at
                    .checked_add(ttl)
                    .ok_or(StorageError::InvalidTtl)?,
            ),
            None => None,
        };

        let id = Uuid::new_v4();
        let (path, size) = self.blobs.write(id, stream).await?;
        let record = FileRecord {
            id,
            filename: filename.to_string(),
            content_type,
            size,
            path: path.to_string_lossy().into_owned(),
            created_at,
            expires_at,
        };

        if let Err(err) = self.catalog.insert(&record).await {
            let _ = self.blobs.delete(&record.path).await;
            return Err(err);
        }

        debug!(
            "stored {} as {} ({} bytes, expires_at: {:?})",
            record.filename, record.id, record.size, record.expires_at
        );
        Ok(record)
    }

    /// Look up an object by id and open its blob for streaming out.
    pub async fn get_for_download(&self, id: Uuid) -> StorageResult<(FileRecord, File)> {
        self.sweep_expired().await?;
        let record = self
            .catalog
            .get_by_id(id)
            .await?
            .ok_or(StorageError::FileNotFound)?;
        self.open_blob(record).await
    }

    /// Like `get_for_download`, resolving the most recent record with
    /// the given filename.
    pub async fn get_for_download_by_name(
        &self,
        filename: &str,
    ) -> StorageResult<(FileRecord, File)> {
        self.sweep_expired().await?;
        let record = self
            .catalog
            .get_latest_by_name(filename)
            .await?
            .ok_or(StorageError::FileNotFound)?;
        self.open_blob(record).await
    }

    // A cataloged record whose blob has gone missing on disk is logically
    // gone; report it as not found rather than an I/O fault.
    async fn open_blob(&self, record: FileRecord) -> StorageResult<(FileRecord, File)> {
        let file = File::open(&record.path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::FileNotFound
            } else {
                StorageError::Io(err)
            }
        })?;
        Ok((record, file))
    }

    /// All live records, newest-first.
    pub async fn list(&self) -> StorageResult<Vec<FileRecord>> {
        self.sweep_expired().await?;
        self.catalog.list_all().await
    }

    /// All live records with the given filename, newest-first. Not found
    /// when nothing matches.
    pub async fn list_by_name(&self, filename: &str) -> StorageResult<Vec<FileRecord>> {
        self.sweep_expired().await?;
        let records = self.catalog.get_by_name(filename).await?;
        if records.is_empty() {
            return Err(StorageError::FileNotFound);
        }
        Ok(records)
    }

    /// Remove one object. Not found when the id has no row.
    pub async fn delete_by_id(&self, id: Uuid) -> StorageResult<FileRecord> {
        self.sweep_expired().await?;
        let record = self
            .catalog
            .delete_by_id(id)
            .await?
            .ok_or(StorageError::FileNotFound)?;
        if let Err(err) = self.blobs.delete(&record.path).await {
            warn!("failed to remove blob {} after delete: {}", record.path, err);
        }
        Ok(record)
    }

    /// Remove every object with the given filename, returning how many
    /// were removed. Not found when nothing matched.
    pub async fn delete_by_name(&self, filename: &str) -> StorageResult<u64> {
        self.sweep_expired().await?;
        let records = self.catalog.delete_by_name(filename).await?;
        if records.is_empty() {
            return Err(StorageError::FileNotFound);
        }
        for record in &records {
            if let Err(err) = self.blobs.delete(&record.path).await {
                warn!("failed to remove blob {} after delete: {}", record.path, err);
            }
        }
        Ok(records.len() as u64)
    }
}
