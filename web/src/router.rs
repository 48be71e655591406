use crate::{
    controller::{health_check_controller, message_controller},
    sse, AppState,
};
use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "SSE Session Relay API"
        ),
        paths(
            health_check_controller::health_check,
            message_controller::create,
        ),
        tags(
            (name = "sse_relay", description = "Session relay over Server-Sent Events")
        )
    )]
struct ApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes(app_state.clone()))
        .merge(sse_routes(app_state.clone()))
        .merge(message_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi2.json", ApiDoc::openapi()).path("/rapidoc"))
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
}

fn health_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check_controller::health_check))
        .with_state(app_state)
}

fn sse_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/sse", get(sse::handler::sse_handler))
        .with_state(app_state)
}

fn message_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/message", post(message_controller::create))
        .with_state(app_state)
}

// Any other method and path combination
async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}
