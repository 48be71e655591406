//! SSE HTTP handler for the web layer.
//!
//! This module contains only the Axum handler for the stream endpoint.
//! Session setup, the registry and reconciliation live in the `sse` crate.

pub(crate) mod handler;
