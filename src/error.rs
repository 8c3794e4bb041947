use axum::{
    Json,
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::store::StoreError;

/// Error envelope returned for every failed request
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Short description of what failed
    #[serde(rename = "Error")]
    pub error: String,
    /// Underlying error text
    #[serde(rename = "ErrorMessage")]
    pub error_message: String,
}

/// Classification attached to every failure response.
///
/// It is inserted as a response extension so the status-mode layer can
/// choose the final status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    ClientInput,
    StoreProtocol,
    Timeout,
    SemanticConflict,
}

impl ErrorKind {
    pub fn refined_status(self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::ClientInput => StatusCode::BAD_REQUEST,
            ErrorKind::StoreProtocol => StatusCode::BAD_GATEWAY,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::SemanticConflict => StatusCode::CONFLICT,
        }
    }
}

/// Custom error type for API endpoints
///
/// Every handler returns `Result<Response, ApiError>`. Failures are logged
/// and rendered as an [`ErrorResponse`] with status 500; the status-mode
/// layer may then replace the status based on the attached [`ErrorKind`].
#[derive(Debug)]
pub enum ApiError {
    /// Key path segment could not be decoded
    InvalidKey(String),
    /// `ttl` query parameter is not a non-negative integer
    InvalidTtl(String),
    /// `index` query parameter is not an integer
    InvalidIndex(String),
    /// Request body could not be read
    BodyRead(String),
    /// Request body is not a single JSON value
    InvalidJson(serde_json::Error),
    /// The store call failed
    Store {
        summary: &'static str,
        source: StoreError,
    },
    /// The store accepted a document write but changed nothing
    SetRejected,
}

impl ApiError {
    pub fn store(summary: &'static str, source: StoreError) -> Self {
        ApiError::Store { summary, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::InvalidKey(_)
            | ApiError::InvalidTtl(_)
            | ApiError::InvalidIndex(_)
            | ApiError::BodyRead(_)
            | ApiError::InvalidJson(_) => ErrorKind::ClientInput,
            ApiError::Store {
                source: StoreError::Timeout(_),
                ..
            } => ErrorKind::Timeout,
            ApiError::Store { .. } => ErrorKind::StoreProtocol,
            ApiError::SetRejected => ErrorKind::SemanticConflict,
        }
    }

    fn summary(&self) -> &'static str {
        match self {
            ApiError::InvalidKey(_) => "Invalid key received",
            ApiError::InvalidTtl(_) => "Incompatible ttl received, must be an integer",
            ApiError::InvalidIndex(_) => "Incompatible index received, must be an integer",
            ApiError::BodyRead(_) => "Error parsing body",
            ApiError::InvalidJson(_) => "Unable to decode body",
            ApiError::Store { summary, .. } => *summary,
            ApiError::SetRejected => "Failed to set",
        }
    }

    fn detail(&self) -> String {
        match self {
            ApiError::InvalidKey(msg)
            | ApiError::InvalidTtl(msg)
            | ApiError::InvalidIndex(msg)
            | ApiError::BodyRead(msg) => msg.clone(),
            ApiError::InvalidJson(err) => err.to_string(),
            ApiError::Store { source, .. } => source.to_string(),
            ApiError::SetRejected => {
                "Unknown failure. Potentially trying to set property on non-json type".to_string()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let body = ErrorResponse {
            error: self.summary().to_string(),
            error_message: self.detail(),
        };

        tracing::error!("{}: {}", body.error, body.error_message);

        let mut response = (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
        response.extensions_mut().insert(kind);
        response
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::InvalidJson(err)
    }
}

/// Response for a read whose key holds no value: an explicit empty 200.
pub fn not_found() -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    response.extensions_mut().insert(ErrorKind::NotFound);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn envelope(response: Response) -> ErrorResponse {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_envelope_shape() {
        let response = ApiError::InvalidIndex("invalid digit found in string".into()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
        assert_eq!(
            response.extensions().get::<ErrorKind>(),
            Some(&ErrorKind::ClientInput)
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let raw: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({
                "Error": "Incompatible index received, must be an integer",
                "ErrorMessage": "invalid digit found in string"
            })
        );
    }

    #[tokio::test]
    async fn test_set_rejected_message() {
        let response = ApiError::SetRejected.into_response();
        assert_eq!(
            response.extensions().get::<ErrorKind>(),
            Some(&ErrorKind::SemanticConflict)
        );

        let body = envelope(response).await;
        assert_eq!(body.error, "Failed to set");
        assert!(body.error_message.contains("non-json type"));
    }

    #[test]
    fn test_store_error_kinds() {
        let timeout = ApiError::store(
            "Failed to pop",
            StoreError::Timeout(Duration::from_millis(5)),
        );
        assert_eq!(timeout.kind(), ErrorKind::Timeout);

        let rejected = ApiError::store("Failed to pop", StoreError::command("ERR nope"));
        assert_eq!(rejected.kind(), ErrorKind::StoreProtocol);
        assert_eq!(rejected.detail(), "ERR nope");
    }

    #[test]
    fn test_refined_statuses() {
        assert_eq!(ErrorKind::NotFound.refined_status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorKind::ClientInput.refined_status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::StoreProtocol.refined_status(), StatusCode::BAD_GATEWAY);
        assert_eq!(ErrorKind::Timeout.refined_status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(ErrorKind::SemanticConflict.refined_status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_not_found_is_explicit_empty_ok() {
        let response = not_found();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("content-type").is_none());
        assert_eq!(
            response.extensions().get::<ErrorKind>(),
            Some(&ErrorKind::NotFound)
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
    }
}
