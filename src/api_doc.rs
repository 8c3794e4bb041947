use utoipa::OpenApi;

use crate::error::ErrorResponse;
use crate::handlers;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "redis-json-gateway API",
        version = "0.1.0",
        description = "HTTP access to Redis keys and RedisJSON documents"
    ),
    paths(
        handlers::raw::raw_get_handler,
        handlers::raw::raw_set_handler,
        handlers::raw::delete_handler,
        handlers::document::document_get_handler,
        handlers::document::document_set_handler,
        handlers::array::array_pop_handler,
        handlers::array::array_insert_handler
    ),
    components(schemas(ErrorResponse)),
    tags(
        (name = "kv", description = "Raw key-value operations"),
        (name = "json", description = "JSON document and array operations")
    )
)]
pub struct ApiDoc;
