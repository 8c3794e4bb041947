use axum::{
    extract::{
        Path, Query, State,
        rejection::{BytesRejection, PathRejection},
    },
    response::Response,
};
use bytes::Bytes;

use super::{decode_json, ok_json, record_key};
use crate::error::{ApiError, ErrorResponse, not_found};
use crate::models::{APPEND_INDEX, ArrayQuery, DEFAULT_POP_INDEX};
use crate::routes;
use crate::state::AppState;

/// GET /{key}/pop handler - Remove and return one array element
///
/// `index` defaults to the first element. Negative indexes count from the end
/// and out-of-range indexes are clamped by the store.
#[utoipa::path(
    get,
    path = routes::KEY_POP,
    params(
        ("key" = String, Path, description = "Document key"),
        ArrayQuery
    ),
    responses(
        (status = 200, description = "The removed element, or an empty body when the array is empty", body = serde_json::Value),
        (status = 500, description = "Invalid index, missing key or non-array target", body = ErrorResponse)
    ),
    tag = "json"
)]
pub async fn array_pop_handler(
    State(state): State<AppState>,
    key: Result<Path<String>, PathRejection>,
    Query(query): Query<ArrayQuery>,
) -> Result<Response, ApiError> {
    let key = record_key(key)?;
    let index = query.index_or(DEFAULT_POP_INDEX)?;
    let path = query.path();
    tracing::info!(
        "Request received for ARRPOP {} with path {} and index {}",
        key,
        path,
        index
    );

    let popped = state
        .call(state.documents.json_arr_pop(&key, path, index))
        .await
        .map_err(|e| ApiError::store("Failed to pop", e))?;

    match popped {
        Some(element) => {
            tracing::info!("Popped element {} from {}", index, key);
            Ok(ok_json(element))
        }
        None => {
            tracing::info!("Nothing to pop from {} at {}", key, path);
            Ok(not_found())
        }
    }
}

/// PUT|POST /{key}/insert handler - Append or insert a JSON value into an array
///
/// Without `index` (or with `-1`) the value is appended. Any other index
/// inserts before the element currently at that position.
#[utoipa::path(
    put,
    path = routes::KEY_INSERT,
    params(
        ("key" = String, Path, description = "Document key"),
        ArrayQuery
    ),
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Value inserted"),
        (status = 500, description = "Invalid index, invalid JSON or store error", body = ErrorResponse)
    ),
    tag = "json"
)]
pub async fn array_insert_handler(
    State(state): State<AppState>,
    key: Result<Path<String>, PathRejection>,
    Query(query): Query<ArrayQuery>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let key = record_key(key)?;
    let index = query.index_or(APPEND_INDEX)?;
    let path = query.path();
    tracing::info!(
        "Request received for ARRINSERT {} with path {} and index {}",
        key,
        path,
        index
    );

    let body = body.map_err(|e| ApiError::BodyRead(e.body_text()))?;
    let value = decode_json(&body)?;

    let inserted = if index == APPEND_INDEX {
        state
            .call(state.documents.json_arr_append(&key, path, &value))
            .await
    } else {
        state
            .call(state.documents.json_arr_insert(&key, path, index, &value))
            .await
    };
    inserted.map_err(|e| ApiError::store("Failed to insert record", e))?;

    tracing::info!("Inserted record into {} at {}", key, path);
    Ok(ok_json(Bytes::new()))
}

#[cfg(test)]
mod tests {
    use crate::handlers::test_support::{app, app_with, envelope, send, test_config};
    use crate::routes;
    use crate::state::AppState;
    use crate::store::{DocumentStore, MemoryStore, StoreResult};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use bytes::Bytes;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::time::Duration;

    async fn document(app: &axum::Router, key: &str) -> Value {
        let (_, _, body) = send(app, "GET", &format!("/{}/json", key), "").await;
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_append_then_pop_last() {
        let app = app();
        send(&app, "PUT", "/list/json", "[1, 2, 3]").await;

        let (status, headers, body) = send(&app, "POST", "/list/insert", "4").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get("content-type").unwrap(), "application/json");
        assert!(body.is_empty());
        assert_eq!(document(&app, "list").await, json!([1, 2, 3, 4]));

        let (status, _, body) = send(&app, "GET", "/list/pop?index=-1", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"4");
        assert_eq!(document(&app, "list").await, json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn test_insert_at_index() {
        let app = app();
        send(&app, "PUT", "/list/json", r#"["a", "c"]"#).await;

        let (status, _, _) = send(&app, "PUT", "/list/insert?index=1", r#""b""#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(document(&app, "list").await, json!(["a", "b", "c"]));
    }

    #[tokio::test]
    async fn test_nested_array_path() {
        let app = app();
        send(&app, "PUT", "/user/json", r#"{"tags": ["x"]}"#).await;

        send(&app, "PUT", "/user/insert?path=.tags", r#"{"id": 2}"#).await;

        let (_, headers, body) = send(&app, "GET", "/user/pop?path=.tags&index=1", "").await;
        assert_eq!(headers.get("content-type").unwrap(), "application/json");
        let popped: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(popped, json!({"id": 2}));
        assert_eq!(document(&app, "user").await, json!({"tags": ["x"]}));
    }

    #[tokio::test]
    async fn test_pop_defaults_to_first_element() {
        let app = app();
        send(&app, "PUT", "/queue/json", r#"["first", "second"]"#).await;

        let (_, _, body) = send(&app, "GET", "/queue/pop", "").await;
        assert_eq!(&body[..], br#""first""#);
        assert_eq!(document(&app, "queue").await, json!(["second"]));
    }

    #[tokio::test]
    async fn test_bad_index_aborts_before_store_call() {
        let app = app();
        send(&app, "PUT", "/list/json", "[1, 2]").await;

        let (status, _, body) = send(&app, "GET", "/list/pop?index=first", "").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            envelope(&body).error,
            "Incompatible index received, must be an integer"
        );

        let (status, _, body) = send(&app, "PUT", "/list/insert?index=1.5", "9").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            envelope(&body).error,
            "Incompatible index received, must be an integer"
        );

        assert_eq!(document(&app, "list").await, json!([1, 2]));
    }

    #[tokio::test]
    async fn test_pop_empty_array_is_empty_ok() {
        let app = app();
        send(&app, "PUT", "/list/json", "[]").await;

        let (status, _, body) = send(&app, "GET", "/list/pop", "").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_pop_missing_key_fails() {
        let app = app();

        let (status, _, body) = send(&app, "GET", "/absent/pop", "").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(envelope(&body).error, "Failed to pop");
    }

    #[tokio::test]
    async fn test_insert_failures() {
        let app = app();
        send(&app, "PUT", "/obj/json", r#"{"a": 1}"#).await;

        let (_, _, body) = send(&app, "PUT", "/obj/insert", "2").await;
        assert_eq!(envelope(&body).error, "Failed to insert record");

        let (_, _, body) = send(&app, "PUT", "/obj/insert", "not json").await;
        assert_eq!(envelope(&body).error, "Unable to decode body");

        send(&app, "PUT", "/list/json", "[1]").await;
        let (_, _, body) = send(&app, "PUT", "/list/insert?index=5", "2").await;
        let error = envelope(&body);
        assert_eq!(error.error, "Failed to insert record");
        assert!(error.error_message.contains("out of bounds"));
    }

    /// Document store whose pops never finish in time
    struct SlowDocuments;

    #[async_trait]
    impl DocumentStore for SlowDocuments {
        async fn json_get(&self, _: &str, _: &str) -> StoreResult<Option<Bytes>> {
            Ok(None)
        }

        async fn json_set(&self, _: &str, _: &str, _: &Value) -> StoreResult<bool> {
            Ok(true)
        }

        async fn json_arr_append(&self, _: &str, _: &str, _: &Value) -> StoreResult<()> {
            Ok(())
        }

        async fn json_arr_insert(&self, _: &str, _: &str, _: i64, _: &Value) -> StoreResult<()> {
            Ok(())
        }

        async fn json_arr_pop(&self, _: &str, _: &str, _: i64) -> StoreResult<Option<Bytes>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_slow_store_hits_deadline() {
        let mut config = test_config();
        config.request_timeout = Some(Duration::from_millis(20));
        config.status_mode = crate::config::StatusMode::Refined;
        let state = AppState::new(Arc::new(MemoryStore::new()), Arc::new(SlowDocuments), config);
        let app = routes::build_router(state);

        let (status, _, body) = send(&app, "GET", "/list/pop", "").await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        let error = envelope(&body);
        assert_eq!(error.error, "Failed to pop");
        assert!(error.error_message.contains("did not complete"));
    }

    #[tokio::test]
    async fn test_refined_mode_empty_pop_is_not_found() {
        let app = app_with(|config| config.status_mode = crate::config::StatusMode::Refined);
        send(&app, "PUT", "/list/json", "[]").await;

        let (status, _, body) = send(&app, "GET", "/list/pop", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.is_empty());
    }
}
