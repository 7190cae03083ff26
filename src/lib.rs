// Quizforge - test authoring core
// Question model, shuffling, document export and the persisted tests store

pub mod commands;
pub mod services;
pub mod traits;

#[cfg(test)]
mod test_utils;

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing_subscriber::EnvFilter;

use services::config::{AppConfig, DEFAULT_LOG_FILTER};
use services::error::Result;
use services::test_store::{StorePersistence, TestStore};
use traits::{FileSystem, RealTimeProvider, TimeProvider, TokioFileSystem};

/// Application state shared across all commands
pub struct AppState {
    pub store: Arc<RwLock<TestStore>>,
    pub persistence: Arc<StorePersistence>,
    /// Destination for exported artifacts and source for imports.
    pub fs: Arc<dyn FileSystem>,
    pub time: Arc<dyn TimeProvider>,
}

impl AppState {
    pub fn new(
        store: TestStore,
        persistence: StorePersistence,
        fs: Arc<dyn FileSystem>,
        time: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            persistence: Arc::new(persistence),
            fs,
            time,
        }
    }

    /// Loads the snapshot at `config.store_path` through `fs`.
    pub async fn load(
        config: &AppConfig,
        fs: Arc<dyn FileSystem>,
        time: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        let persistence = StorePersistence::new(fs.clone(), config.store_path.clone());
        let store = persistence.load().await?;
        Ok(Self::new(store, persistence, fs, time))
    }
}

/// Installs the global fmt subscriber. Later calls are no-ops.
pub fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|e| {
        eprintln!("Invalid log filter {:?}: {}", config.log_filter, e);
        EnvFilter::new(DEFAULT_LOG_FILTER)
    });

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Reads the environment, sets up logging and loads the store from disk.
pub async fn start() -> Result<AppState> {
    let config = AppConfig::from_env();
    init_logging(&config);

    tracing::info!("Starting quizforge with store {}", config.store_path.display());

    AppState::load(
        &config,
        Arc::new(TokioFileSystem::new()),
        Arc::new(RealTimeProvider::new()),
    )
    .await
}
