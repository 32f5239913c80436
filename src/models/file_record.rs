//! Represents one stored file: the metadata row, not the content bytes.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata describing a single stored blob.
///
/// One row per upload. The blob bytes live in a flat directory on disk at
/// `path`; everything the API reports about an object comes from this row.
/// Rows are immutable once written and are only ever removed, either by an
/// explicit delete or by the expiration sweep.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct FileRecord {
    /// Unique identifier, generated at upload time. Never reused.
    pub id: Uuid,

    /// Client-supplied display name. Not unique across records.
    pub filename: String,

    /// Content type (MIME type), passed through verbatim.
    pub content_type: Option<String>,

    /// Size in bytes, fixed at creation.
    pub size: i64,

    /// Location of the backing blob file. Internal, never serialized.
    #[serde(skip_serializing, default)]
    pub path: String,

    /// Creation time, seconds since the Unix epoch.
    pub created_at: i64,

    /// Absolute expiration time, seconds since the Unix epoch.
    /// `None` means the object never expires.
    pub expires_at: Option<i64>,
}
