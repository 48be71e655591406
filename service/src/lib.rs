use config::Config;
use log::info;
use std::sync::Arc;
use store::{MemoryStore, RedisStore, SessionStore, StoreSettings};

pub mod config;
pub mod logging;

pub fn store_settings(config: &Config) -> StoreSettings {
    StoreSettings {
        key_prefix: config.key_prefix.clone(),
        queue_ttl: config.queue_ttl(),
        timeout: config.store_timeout(),
    }
}

/// Connects the session store selected by `store_url`.
pub async fn init_store(config: &Config) -> Result<Arc<dyn SessionStore>, store::Error> {
    let settings = store_settings(config);

    info!(
        "Session store config: prefix={}, session_ttl={}s, queue_ttl={}s, timeout={}ms",
        settings.key_prefix,
        config.session_ttl_secs,
        config.queue_ttl_secs,
        config.store_timeout_millis,
    );

    if config.uses_memory_store() {
        info!("Using in-process session store; sessions are not shared across nodes");
        return Ok(Arc::new(MemoryStore::new(settings.queue_ttl)));
    }

    let store = RedisStore::connect(config.store_url(), settings).await?;
    Ok(Arc::new(store))
}

// Service-level state containing only infrastructure concerns
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub session_store: Arc<dyn SessionStore>,
    pub config: Config,
}

impl AppState {
    pub fn new(app_config: Config, store: &Arc<dyn SessionStore>) -> Self {
        Self {
            session_store: Arc::clone(store),
            config: app_config,
        }
    }
}
