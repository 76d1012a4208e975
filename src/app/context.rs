use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::app::error::{BookrateError, Result};
use crate::background::{spawn_rating_service, RatingBridge};
use crate::cache::RatingCache;
use crate::config::Config;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::goodreads::GoodreadsClient;
use crate::store::SqliteStore;
use crate::sync::{BookSink, DisabledSync, ServerSync};

pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub cache: Arc<RatingCache>,
    pub fetcher: Arc<dyn Fetcher + Send + Sync>,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let db_path = match config.server.database.clone() {
            Some(p) => p,
            None => Self::data_file("books.db")?,
        };
        let cache_path = match config.cache.path.clone() {
            Some(p) => p,
            None => Self::data_file("cache.db")?,
        };

        let store = Arc::new(SqliteStore::new(&db_path)?);
        let cache = Arc::new(RatingCache::new(&cache_path)?);
        let fetcher: Arc<dyn Fetcher + Send + Sync> =
            Arc::new(HttpFetcher::new(config.goodreads.timeout(), None)?);

        Ok(Self {
            config,
            store,
            cache,
            fetcher,
        })
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        let cache = Arc::new(RatingCache::in_memory()?);
        let fetcher: Arc<dyn Fetcher + Send + Sync> =
            Arc::new(HttpFetcher::new(config.goodreads.timeout(), None)?);

        Ok(Self {
            config,
            store,
            cache,
            fetcher,
        })
    }

    pub fn goodreads_client(&self) -> GoodreadsClient {
        GoodreadsClient::new(self.fetcher.clone(), self.config.goodreads.base_url.clone())
    }

    pub fn sink(&self) -> Result<Arc<dyn BookSink>> {
        if self.config.sync.enabled {
            let sync = ServerSync::new(self.config.sync.server_url.clone())?;
            info!("Syncing books to {}", sync.server_url());
            Ok(Arc::new(sync))
        } else {
            Ok(Arc::new(DisabledSync))
        }
    }

    /// Start the background rating service wired to this context
    pub fn start_rating_service(&self) -> Result<(RatingBridge, JoinHandle<()>)> {
        let goodreads = self.goodreads_client();
        info!("Looking up ratings on {}", goodreads.base_url());
        Ok(spawn_rating_service(
            self.cache.clone(),
            goodreads,
            self.sink()?,
            self.config.cache.clean_on_start,
        ))
    }

    fn data_file(name: &str) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| BookrateError::Config("Could not find data directory".into()))?;
        let bookrate_dir = data_dir.join("bookrate");
        std::fs::create_dir_all(&bookrate_dir)?;
        Ok(bookrate_dir.join(name))
    }
}
