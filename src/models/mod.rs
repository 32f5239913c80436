//! Data models for the file storage service.
//!
//! `FileRecord` maps one-to-one onto the catalog table via `sqlx::FromRow`
//! and serializes naturally as JSON via `serde`.

pub mod file_record;
