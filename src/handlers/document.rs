use axum::{
    extract::{
        Path, Query, State,
        rejection::{BytesRejection, PathRejection},
    },
    response::Response,
};
use bytes::Bytes;

use super::{decode_json, ok_empty, ok_json, record_key};
use crate::error::{ApiError, ErrorResponse, not_found};
use crate::models::DocumentQuery;
use crate::routes;
use crate::state::AppState;

/// GET /{key}/json handler - Read a JSON document or a value inside it
#[utoipa::path(
    get,
    path = routes::KEY_JSON,
    params(
        ("key" = String, Path, description = "Document key"),
        DocumentQuery
    ),
    responses(
        (status = 200, description = "JSON at the path, or an empty body when the key is absent", body = serde_json::Value),
        (status = 500, description = "Store error, e.g. the path does not exist", body = ErrorResponse)
    ),
    tag = "json"
)]
pub async fn document_get_handler(
    State(state): State<AppState>,
    key: Result<Path<String>, PathRejection>,
    Query(query): Query<DocumentQuery>,
) -> Result<Response, ApiError> {
    let key = record_key(key)?;
    let path = query.path();
    tracing::info!("Request received for JSON GET {} with path {}", key, path);

    let value = state
        .call(state.documents.json_get(&key, path))
        .await
        .map_err(|e| ApiError::store("Unexpected error occurred", e))?;

    match value {
        Some(json) => {
            tracing::info!("Successfully retrieved document {} at {}", key, path);
            Ok(ok_json(json))
        }
        None => {
            tracing::info!("No value found for key: {}", key);
            Ok(not_found())
        }
    }
}

/// PUT|POST /{key}/json handler - Write a JSON value at a path
///
/// Any JSON value is accepted. A write the store silently ignores, such as a
/// property under a scalar, is reported as a failure.
#[utoipa::path(
    put,
    path = routes::KEY_JSON,
    params(
        ("key" = String, Path, description = "Document key"),
        DocumentQuery
    ),
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Value written"),
        (status = 500, description = "Invalid JSON, incompatible target or store error", body = ErrorResponse)
    ),
    tag = "json"
)]
pub async fn document_set_handler(
    State(state): State<AppState>,
    key: Result<Path<String>, PathRejection>,
    Query(query): Query<DocumentQuery>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let key = record_key(key)?;
    let path = query.path();
    tracing::info!("Request received for JSON SET {} with path {}", key, path);

    let body = body.map_err(|e| ApiError::BodyRead(e.body_text()))?;
    let value = decode_json(&body)?;

    let written = state
        .call(state.documents.json_set(&key, path, &value))
        .await
        .map_err(|e| ApiError::store("Failed to set", e))?;
    if !written {
        return Err(ApiError::SetRejected);
    }

    tracing::info!("Successfully stored document {} at {}", key, path);
    Ok(ok_empty())
}
