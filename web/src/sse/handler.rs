use crate::AppState;
use async_stream::stream;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use log::*;
use sse::{ConnectionRequest, Frame, OpenConnection};
use std::convert::Infallible;

/// SSE handler that opens a long-lived stream bound to a fresh session id.
///
/// The first event is the handshake carrying the session id. If the session
/// cannot be set up, the stream carries a single error event and ends.
pub(crate) async fn sse_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let request = ConnectionRequest {
        host: header_value(&headers, header::HOST),
        user_agent: header_value(&headers, header::USER_AGENT),
    };
    debug!("Establishing SSE connection from {:?}", request.user_agent);

    let opened = app_state.sse_manager.connections().open(&request).await;

    let stream = stream! {
        match opened {
            Ok(OpenConnection { mut events, guard, shutdown, .. }) => {
                // Dropped with the response body, which closes the session.
                let _guard = guard;
                while let Some(event) = tokio::select! {
                    event = events.recv() => event,
                    _ = shutdown.cancelled() => None,
                } {
                    yield event;
                }
            }
            Err(e) => {
                warn!("Failed to establish SSE connection: {e}");
                match Frame::error(e.to_string()).to_event() {
                    Ok(event) => yield Ok(event),
                    Err(e) => error!("Failed to encode SSE error frame: {e}"),
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
