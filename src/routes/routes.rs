//! Defines routes for all file storage operations.
//!
//! ## Structure
//! - **Collection endpoints**
//!   - `POST   /files` — upload (raw streaming body, `?filename=&ttl=`)
//!   - `GET    /files` — list all records, newest-first
//!
//! - **By-id endpoints**
//!   - `GET    /files/{id}` — download object bytes
//!   - `DELETE /files/{id}` — delete object
//!
//! - **By-name endpoints** (filenames are not unique; these resolve all or
//!   the latest match)
//!   - `GET    /files/by-name/{filename}` — list matches
//!   - `GET    /files/by-name/{filename}/download` — download latest match
//!   - `DELETE /files/by-name/{filename}` — delete all matches
//!
//! The static `by-name` segment takes precedence over the `{id}` capture.

use crate::{
    handlers::{
        file_handlers::{
            delete_file, delete_file_by_name, download_file, download_file_by_name, list_files,
            list_files_by_name, upload_file,
        },
        health_handlers::{healthz, readyz},
    },
    services::object_service::ObjectService,
};
use axum::{
    Router,
    routing::get,
};

/// Build and return the router for all file storage routes.
///
/// The router carries shared state (`ObjectService`) to all handlers.
pub fn routes() -> Router<ObjectService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // collection routes
        .route("/files", get(list_files).post(upload_file))
        // by-id routes
        .route("/files/{id}", get(download_file).delete(delete_file))
        // by-name routes
        .route(
            "/files/by-name/{filename}",
            get(list_files_by_name).delete(delete_file_by_name),
        )
        .route(
            "/files/by-name/{filename}/download",
            get(download_file_by_name),
        )
}
