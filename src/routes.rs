// Route table - path constants and router assembly for the whole HTTP surface

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, Method},
    middleware,
    response::Response,
    routing::{get, put},
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{Config, StatusMode};
use crate::error::ErrorKind;
use crate::handlers;
use crate::state::AppState;

pub const KEY: &str = "/{key}";
pub const KEY_JSON: &str = "/{key}/json";
pub const KEY_POP: &str = "/{key}/pop";
pub const KEY_INSERT: &str = "/{key}/insert";
pub const API_DOC: &str = "/openapi.json";

/// Builds the full HTTP surface over the given state
pub fn build_router(state: AppState) -> Router {
    let status_mode = state.config.status_mode;
    let cors = cors_layer(&state.config);
    let body_limit = match state.config.max_body_bytes {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    let mut router: Router<AppState> = Router::new()
        .route(
            KEY_JSON,
            get(handlers::document_get_handler)
                .put(handlers::document_set_handler)
                .post(handlers::document_set_handler)
                .delete(handlers::delete_handler),
        )
        .route(KEY_POP, get(handlers::array_pop_handler))
        .route(
            KEY_INSERT,
            put(handlers::array_insert_handler)
                .post(handlers::array_insert_handler),
        )
        .route(
            KEY,
            get(handlers::raw_get_handler)
                .put(handlers::raw_set_handler)
                .post(handlers::raw_set_handler)
                .delete(handlers::delete_handler),
        );

    if state.config.api_docs_enabled {
        router = router.route(API_DOC, get(handlers::openapi_handler));
    }

    router
        .layer(body_limit)
        .layer(middleware::map_response_with_state(status_mode, apply_status_mode))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Rewrites the status of classified responses when running in refined mode
async fn apply_status_mode(State(mode): State<StatusMode>, mut response: Response) -> Response {
    if mode == StatusMode::Refined {
        if let Some(kind) = response.extensions().get::<ErrorKind>().copied() {
            *response.status_mut() = kind.refined_status();
        }
    }
    response
}

fn cors_layer(config: &Config) -> CorsLayer {
    let layer =
        CorsLayer::new().allow_methods([Method::GET, Method::PUT, Method::POST, Method::DELETE]);

    // Wildcard origins cannot be combined with credentials
    if config.cors_allows_any_origin() {
        return layer.allow_origin(Any);
    }

    let origins = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect::<Vec<_>>();

    layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}
