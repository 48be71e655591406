use crate::error::{Error, Result};
use crate::params::message::MessageParams;
use crate::AppState;
use ::sse::error::{Error as RelayError, RelayErrorKind};
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use log::*;
use serde_json::json;

/// POST a message to the stream of an existing session
///
/// The message is accepted once the shared store has queued it; it reaches
/// the stream on whichever node holds it within one poll interval.
#[utoipa::path(
    post,
    path = "/message",
    params(MessageParams),
    request_body(content = Object, description = "Any JSON value, relayed to the stream verbatim"),
    responses(
        (status = 200, description = "Message queued for delivery", body = Object),
        (status = 400, description = "Missing, unknown or undecodable sessionId, or the body is not JSON"),
        (status = 500, description = "Session store unavailable"),
    )
)]
pub async fn create(
    State(app_state): State<AppState>,
    query: core::result::Result<Query<MessageParams>, QueryRejection>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let Query(params) = query.map_err(|rejection| {
        Error::from(RelayError::new(
            RelayErrorKind::InvalidParameter,
            rejection.body_text(),
        ))
    })?;
    debug!(
        "POST message for session {:?} ({} bytes)",
        params.session_id,
        body.len()
    );

    let outcome = app_state
        .sse_manager
        .relay()
        .relay(params.session_id.as_deref(), &body)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "queued": outcome.queued })),
    ))
}

#[cfg(test)]
mod tests {
    use crate::router::define_routes;
    use crate::test_support::{app_state, app_state_with};
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use sse::testing::UnavailableStore;
    use std::sync::Arc;
    use std::time::Duration;
    use store::{MemoryStore, Session, SessionStore};
    use tower::ServiceExt;

    fn post(uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_missing_session_id_returns_400() {
        let app = define_routes(app_state());

        let response = app.oneshot(post("/message", r#"{"foo":1}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({"error": "Missing sessionId parameter"})
        );
    }

    #[tokio::test]
    async fn test_unknown_session_returns_400() {
        let app = define_routes(app_state());

        let response = app
            .oneshot(post("/message?sessionId=does-not-exist", r#"{"foo":1}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({"error": "No active session for the provided sessionId"})
        );
    }

    #[tokio::test]
    async fn test_known_session_is_queued() {
        let store = Arc::new(MemoryStore::default());
        let session = Session::new("other-node:4000", None);
        store
            .put_session(&session, Duration::from_secs(60))
            .await
            .unwrap();
        let app = define_routes(app_state_with(store.clone()));

        let uri = format!("/message?sessionId={}", session.id);
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .body(Body::from(r#"{"foo":1}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"success": true, "queued": true})
        );
        let backlog = store.pending(&session.id).await.unwrap();
        assert_eq!(backlog.messages[0].payload, json!({"foo": 1}));
    }

    #[tokio::test]
    async fn test_malformed_body_returns_400() {
        let store = Arc::new(MemoryStore::default());
        let session = Session::new("localhost", None);
        store
            .put_session(&session, Duration::from_secs(60))
            .await
            .unwrap();
        let app = define_routes(app_state_with(store));

        let uri = format!("/message?sessionId={}", session.id);
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_repeated_session_id_returns_json_400() {
        let app = define_routes(app_state());

        let response = app
            .oneshot(post("/message?sessionId=a&sessionId=b", r#"{"foo":1}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid query string"));
    }

    #[tokio::test]
    async fn test_store_outage_returns_500() {
        let app = define_routes(app_state_with(Arc::new(UnavailableStore)));

        let response = app
            .oneshot(post("/message?sessionId=abc", r#"{"foo":1}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Session store unavailable"));
    }
}
