pub mod array;
pub mod docs;
pub mod document;
pub mod raw;

pub use array::{array_insert_handler, array_pop_handler};
pub use docs::openapi_handler;
pub use document::{document_get_handler, document_set_handler};
pub use raw::{delete_handler, raw_get_handler, raw_set_handler};

use axum::{
    body::Body,
    extract::{Path, rejection::PathRejection},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use bytes::Bytes;

use crate::error::ApiError;

/// Unwraps the `{key}` segment, reporting undecodable keys through the error envelope
pub(crate) fn record_key(key: Result<Path<String>, PathRejection>) -> Result<String, ApiError> {
    key.map(|Path(key)| key)
        .map_err(|e| ApiError::InvalidKey(e.body_text()))
}

/// Empty 200 response
pub(crate) fn ok_empty() -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    response
}

/// 200 response carrying JSON bytes exactly as the store returned them
pub(crate) fn ok_json(body: Bytes) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::OK;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

/// Decodes a request body holding exactly one JSON value of any type
pub(crate) fn decode_json(body: &[u8]) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::from_slice(body)
}
