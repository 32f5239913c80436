//! Core storage services: blob files on disk, metadata rows in SQLite, and
//! the lazy expiration sweep that keeps the two in agreement.

pub mod blob_store;
pub mod catalog;
pub mod object_service;
pub mod reaper;

use std::io;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("ttl must be a positive number of seconds")]
    InvalidTtl,
    #[error("file not found")]
    FileNotFound,
    #[error("duplicate file id `{0}`")]
    DuplicateId(Uuid),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;
