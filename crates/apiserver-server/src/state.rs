use apiserver_storage::WorkerStore;
use std::sync::Arc;

use crate::auth::BasicAuth;
use crate::config::ServerConfig;

/// Shared by every handler. Nothing in here changes after startup.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<WorkerStore>,
    pub auth: Arc<BasicAuth>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: WorkerStore, config: ServerConfig) -> Self {
        Self {
            store: Arc::new(store),
            auth: Arc::new(BasicAuth::from_config(&config.auth)),
            config: Arc::new(config),
        }
    }
}
