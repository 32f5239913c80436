//! HTTP handlers for file upload, listing, download, and deletion.
//! Bodies stream in both directions; storage decisions live in
//! `ObjectService`.

use crate::{
    errors::AppError, models::file_record::FileRecord,
    services::object_service::ObjectService,
};
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// Query params accepted by `POST /files`.
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// Display name recorded for the object.
    pub filename: Option<String>,
    /// Time-to-live in seconds; must be strictly positive when present.
    pub ttl: Option<i64>,
}

#[derive(Serialize)]
pub struct ListResponse {
    pub items: Vec<FileRecord>,
}

/// POST `/files?filename=&ttl=` — streaming upload of the raw request body.
pub async fn upload_file(
    State(service): State<ObjectService>,
    Query(q): Query<UploadQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let filename = q.filename.filter(|name| !name.is_empty()).ok_or_else(|| {
        AppError::new(
            StatusCode::BAD_REQUEST,
            "missing `filename` query parameter",
        )
    })?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let stream = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(io::Error::other));

    let record = service
        .upload(stream, &filename, content_type, q.ttl)
        .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET `/files` — all records, newest-first.
pub async fn list_files(
    State(service): State<ObjectService>,
) -> Result<Json<ListResponse>, AppError> {
    let items = service.list().await?;
    Ok(Json(ListResponse { items }))
}

/// GET `/files/{id}` — stream an object's bytes back out.
pub async fn download_file(
    State(service): State<ObjectService>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (record, file) = service.get_for_download(id).await?;
    Ok(blob_response(record, file))
}

/// GET `/files/by-name/{filename}` — all records with that name; 404 when empty.
pub async fn list_files_by_name(
    State(service): State<ObjectService>,
    Path(filename): Path<String>,
) -> Result<Json<ListResponse>, AppError> {
    let items = service.list_by_name(&filename).await?;
    Ok(Json(ListResponse { items }))
}

/// GET `/files/by-name/{filename}/download` — the most recent match, streamed.
pub async fn download_file_by_name(
    State(service): State<ObjectService>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let (record, file) = service.get_for_download_by_name(&filename).await?;
    Ok(blob_response(record, file))
}

/// DELETE `/files/{id}`
pub async fn delete_file(
    State(service): State<ObjectService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    service.delete_by_id(id).await?;
    Ok(Json(json!({ "deleted": true })))
}

/// DELETE `/files/by-name/{filename}` — removes every match.
pub async fn delete_file_by_name(
    State(service): State<ObjectService>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let count = service.delete_by_name(&filename).await?;
    Ok(Json(json!({ "deleted": true, "count": count })))
}

fn blob_response(record: FileRecord, file: File) -> Response {
    let stream = ReaderStream::new(file);
    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = StatusCode::OK;
    set_file_headers(response.headers_mut(), &record);
    response
}

fn set_file_headers(headers: &mut HeaderMap, record: &FileRecord) {
    let content_type = record
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".into());
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&record.size.max(0).to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );

    let disposition = format!(
        "attachment; filename=\"{}\"",
        sanitize_filename(&record.filename)
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
}

/// Keep the advertised download name header-safe.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect()
}
