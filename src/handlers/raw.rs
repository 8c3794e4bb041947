use axum::{
    body::Body,
    extract::{
        Path, Query, State,
        rejection::{BytesRejection, PathRejection},
    },
    http::StatusCode,
    response::Response,
};
use bytes::Bytes;

use super::{ok_empty, record_key};
use crate::error::{ApiError, ErrorResponse, not_found};
use crate::models::RawSetQuery;
use crate::routes;
use crate::state::AppState;

/// GET /{key} handler - Read a raw value
///
/// The stored bytes are returned untouched and without a content type.
/// A key holding nothing yields an empty 200.
#[utoipa::path(
    get,
    path = routes::KEY,
    params(
        ("key" = String, Path, description = "Record key")
    ),
    responses(
        (status = 200, description = "Stored bytes, or an empty body when the key is absent"),
        (status = 500, description = "Store error", body = ErrorResponse)
    ),
    tag = "kv"
)]
pub async fn raw_get_handler(
    State(state): State<AppState>,
    key: Result<Path<String>, PathRejection>,
) -> Result<Response, ApiError> {
    let key = record_key(key)?;
    tracing::info!("Request received for GET {}", key);

    let value = state
        .call(state.kv.get(&key))
        .await
        .map_err(|e| ApiError::store("Unexpected error occurred", e))?;

    match value {
        Some(bytes) => {
            tracing::info!("Successfully retrieved value for key: {}", key);
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = StatusCode::OK;
            Ok(response)
        }
        None => {
            tracing::info!("No value found for key: {}", key);
            Ok(not_found())
        }
    }
}

/// PUT|POST /{key} handler - Store the request body as a raw value
#[utoipa::path(
    put,
    path = routes::KEY,
    params(
        ("key" = String, Path, description = "Record key"),
        RawSetQuery
    ),
    request_body(content = String, description = "Bytes to store", content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Value stored"),
        (status = 500, description = "Invalid ttl or store error", body = ErrorResponse)
    ),
    tag = "kv"
)]
pub async fn raw_set_handler(
    State(state): State<AppState>,
    key: Result<Path<String>, PathRejection>,
    Query(query): Query<RawSetQuery>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let key = record_key(key)?;
    let ttl = query.ttl()?;
    tracing::info!("Request received for SET {} with ttl of {:?}", key, ttl);

    let body = body.map_err(|e| ApiError::BodyRead(e.body_text()))?;

    state
        .call(state.kv.set(&key, body, ttl))
        .await
        .map_err(|e| ApiError::store("Error setting value to redis", e))?;

    tracing::info!("Successfully stored value for key: {}", key);
    Ok(ok_empty())
}

/// DELETE /{key} and /{key}/json handler - Remove a key
///
/// Deleting a key that does not exist succeeds.
#[utoipa::path(
    delete,
    path = routes::KEY,
    params(
        ("key" = String, Path, description = "Record key")
    ),
    responses(
        (status = 200, description = "Key removed or already absent"),
        (status = 500, description = "Store error", body = ErrorResponse)
    ),
    tag = "kv"
)]
pub async fn delete_handler(
    State(state): State<AppState>,
    key: Result<Path<String>, PathRejection>,
) -> Result<Response, ApiError> {
    let key = record_key(key)?;
    tracing::info!("Request received for DELETE {}", key);

    state
        .call(state.kv.delete(&key))
        .await
        .map_err(|e| ApiError::store("Error deleting value from redis", e))?;

    tracing::info!("Successfully deleted key: {}", key);
    Ok(ok_empty())
}
