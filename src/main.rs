use log::{error, info};
use service::{config::Config, logging::Logger};

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to initialize logger: {e}");
    }

    info!("Starting SSE relay [{}]...", config.runtime_env());

    let session_store = match service::init_store(&config).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to connect to the session store: {e}");
            std::process::exit(1);
        }
    };

    let service_state = service::AppState::new(config, &session_store);
    let app_state = web::AppState::new(service_state);
    let sse_manager = app_state.sse_manager.clone();

    if let Err(e) = web::init_server(app_state).await {
        error!("Server failed: {e}");
        std::process::exit(1);
    }

    info!("Server stopped with {} stream(s) still open", sse_manager.active_sessions());
}
