use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::db::Store;
use crate::scrape::{ChromeLauncher, SessionLauncher};
use crate::services::{BrowserScrapeService, ScrapeService};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub scrape_service: Arc<dyn ScrapeService>,
}

impl SharedState {
    /// Opens the database and wires a Chromium-backed scrape service.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let launcher =
            Arc::new(ChromeLauncher::new(config.browser.clone())) as Arc<dyn SessionLauncher>;
        Ok(Self::with_launcher(config, store, launcher))
    }

    /// State over an existing store and any session launcher.
    #[must_use]
    pub fn with_launcher(
        config: Config,
        store: Store,
        launcher: Arc<dyn SessionLauncher>,
    ) -> Self {
        let config = Arc::new(RwLock::new(config));
        let scrape_service = Arc::new(BrowserScrapeService::new(
            store.clone(),
            Arc::clone(&config),
            launcher,
        )) as Arc<dyn ScrapeService>;

        Self {
            config,
            store,
            scrape_service,
        }
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }
}
