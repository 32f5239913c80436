//! Flat on-disk blob storage.
//!
//! Blobs are opaque files in a single directory, named by their record id.
//! This layer knows nothing about metadata or expiry; it only moves bytes.

use crate::services::{StorageError, StorageResult};
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

/// Writes, removes, and checks blob payloads beneath a single root directory.
#[derive(Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding all blob files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stream a new blob to disk under `root/<id>`.
    ///
    /// Bytes go to a uniquely named temp file in bounded chunks and are
    /// renamed into place once fully written and synced, so a crash
    /// mid-write never leaves a half-written blob at the final path.
    /// Returns the final path and total byte count.
    pub async fn write<S>(&self, id: Uuid, stream: S) -> StorageResult<(PathBuf, i64)>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        fs::create_dir_all(&self.root).await?;
        let final_path = self.root.join(id.to_string());
        let tmp_path = self.root.join(format!(".tmp-{}", id));
        let mut file = File::create(&tmp_path).await?;

        let mut size: i64 = 0;
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(StorageError::Io(err));
                }
            };
            size += chunk.len() as i64;
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = fs::rename(&tmp_path, &final_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        debug!("wrote blob {} ({} bytes)", final_path.display(), size);
        Ok((final_path, size))
    }

    /// Remove the blob at `path`.
    ///
    /// Idempotent: an already-missing file reports `Ok(false)`; only
    /// genuine OS-level failures surface as errors.
    pub async fn delete(&self, path: &str) -> StorageResult<bool> {
        match fs::remove_file(path).await {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    /// Whether a blob file is present at `path`.
    pub async fn exists(&self, path: &str) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tempfile::tempdir;

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = io::Result<Bytes>> + Send {
        let items: Vec<io::Result<Bytes>> =
            parts.iter().map(|p| Ok(Bytes::from_static(p))).collect();
        stream::iter(items)
    }

    #[tokio::test]
    async fn write_streams_all_chunks() {
        let dir = tempdir().expect("tempdir");
        let store = BlobStore::new(dir.path());
        let id = Uuid::new_v4();

        let (path, size) = store
            .write(id, chunks(&[b"hel", b"lo ", b"world"]))
            .await
            .expect("write");

        assert_eq!(size, 11);
        assert_eq!(path, dir.path().join(id.to_string()));
        let bytes = fs::read(&path).await.expect("read back");
        assert_eq!(bytes, b"hello world");
        assert!(store.exists(path.to_str().expect("utf8 path")).await);
    }

    #[tokio::test]
    async fn write_accepts_empty_stream() {
        let dir = tempdir().expect("tempdir");
        let store = BlobStore::new(dir.path());

        let (path, size) = store
            .write(Uuid::new_v4(), chunks(&[]))
            .await
            .expect("write");

        assert_eq!(size, 0);
        assert_eq!(fs::read(&path).await.expect("read back"), b"");
    }

    #[tokio::test]
    async fn failed_stream_leaves_nothing_behind() {
        let dir = tempdir().expect("tempdir");
        let store = BlobStore::new(dir.path());

        let bad = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::other("client went away")),
        ]);
        let result = store.write(Uuid::new_v4(), bad).await;
        assert!(matches!(result, Err(StorageError::Io(_))));

        let mut entries = fs::read_dir(dir.path()).await.expect("read_dir");
        assert!(entries.next_entry().await.expect("entry").is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempdir().expect("tempdir");
        let store = BlobStore::new(dir.path());
        let (path, _) = store
            .write(Uuid::new_v4(), chunks(&[b"bytes"]))
            .await
            .expect("write");
        let path = path.to_str().expect("utf8 path").to_string();

        assert!(store.delete(&path).await.expect("first delete"));
        assert!(!store.delete(&path).await.expect("second delete"));
        assert!(!store.exists(&path).await);
    }
}
