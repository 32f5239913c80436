//! Lazy expiration sweep.
//!
//! There is no background timer: the sweep runs at the start of every
//! public operation, so staleness is bounded by the time since the last
//! request. Expired objects linger only while the service sees no traffic.

use crate::services::StorageResult;
use crate::services::blob_store::BlobStore;
use crate::services::catalog::Catalog;
use tracing::{debug, warn};

/// Remove every record whose expiry has passed: blob file first
/// (best-effort), catalog row second. Returns the number of rows removed.
///
/// Safe to run concurrently with itself. A record already reclaimed by
/// another pass is either absent from this scan or its row delete comes
/// back empty; only rows this pass actually removed are counted.
pub async fn sweep(catalog: &Catalog, blobs: &BlobStore, now: i64) -> StorageResult<u64> {
    let expired = catalog.find_expired(now).await?;
    let mut removed = 0u64;
    for record in expired {
        if let Err(err) = blobs.delete(&record.path).await {
            warn!("failed to remove expired blob {}: {}", record.path, err);
        }
        if catalog.delete_by_id(record.id).await?.is_some() {
            removed += 1;
        }
    }
    if removed > 0 {
        debug!("reaped {} expired file(s)", removed);
    }
    Ok(removed)
}
