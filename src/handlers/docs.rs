use axum::Json;
use utoipa::OpenApi;

use crate::api_doc::ApiDoc;

/// GET /openapi.json handler - Serve the OpenAPI document
pub async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
