use axum::http::{header, Method};
use log::*;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub(crate) mod controller;
pub mod error;
pub(crate) mod params;
pub mod router;
pub(crate) mod sse;

// Web-level state: the service infrastructure plus this node's session relay.
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub service_state: service::AppState,
    pub sse_manager: Arc<::sse::Manager>,
}

impl AppState {
    /// Builds this node's relay on top of the service's session store.
    pub fn new(service_state: service::AppState) -> Self {
        let config = &service_state.config;
        let settings = ::sse::RelaySettings {
            poll_interval: config.poll_interval(),
            session_ttl: config.session_ttl(),
        };
        let sse_manager = Arc::new(::sse::Manager::new(
            Arc::clone(&service_state.session_store),
            settings,
        ));

        Self {
            service_state,
            sse_manager,
        }
    }

    pub fn config(&self) -> &service::config::Config {
        &self.service_state.config
    }
}

/// Serves the relay until Ctrl-C.
pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let config = app_state.config();
    let server_url = format!("{}:{}", config.interface(), config.port);
    let cors = build_cors(&config.allowed_origins);

    let listener = TcpListener::bind(&server_url).await?;
    info!("Server starting... listening for connections on http://{server_url}");

    let sse_manager = app_state.sse_manager.clone();
    let app = router::define_routes(app_state).layer(cors);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sse_manager))
        .await
}

// Streams never end on their own, so they are closed before the server drains.
async fn shutdown_signal(sse_manager: Arc<::sse::Manager>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        return;
    }
    info!("Shutdown signal received, closing open streams...");
    sse_manager.shutdown();
}

fn build_cors(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::CACHE_CONTROL]);

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(parsed)
    }
}
