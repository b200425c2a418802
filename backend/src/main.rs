mod core;
mod infra;

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::core::catalog::CatalogClient;
use crate::core::storage::{MemoryStorage, StorageError, StorageProvider};
use crate::core::watchlist::Watchlist;
use infra::config::{Config, StorageMode};
use infra::database::SqlStorage;
use infra::file_storage::FileStorage;
use infra::tmdb::TmdbClient;
use infra::web::{AppState, SharedWatchlist};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    // The blocking HTTP client and SqlStorage each own a runtime, so they are
    // built here and outlive the server runtime below.
    let tmdb = TmdbClient::from_config(&config.catalog)?;
    if !tmdb.is_configured() {
        warn!("TMDB_API_KEY not set, catalog search and details are disabled");
    }
    let catalog: Arc<dyn CatalogClient> = Arc::new(tmdb);

    let mut watchlist = Watchlist::initialize(open_storage(&config.storage));
    info!(count = watchlist.len(), "Watchlist loaded");
    watchlist.subscribe(|items| debug!(count = items.len(), "Watchlist changed"));
    let watchlist: SharedWatchlist = Arc::new(Mutex::new(watchlist));

    let state = AppState::new(Arc::clone(&watchlist), Arc::clone(&catalog));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(infra::web::start_server(state, config.port))?;
    Ok(())
}

/// Durable storage for the watchlist. When the configured backend cannot be
/// opened the session continues in memory only.
fn open_storage(mode: &StorageMode) -> Box<dyn StorageProvider> {
    let opened: Result<Box<dyn StorageProvider>, StorageError> = match mode {
        StorageMode::File { dir } => {
            FileStorage::new(dir).map(|s| Box::new(s) as Box<dyn StorageProvider>)
        }
        StorageMode::Local { path } => {
            SqlStorage::local(path).map(|s| Box::new(s) as Box<dyn StorageProvider>)
        }
        StorageMode::Turso { url, token } => {
            SqlStorage::turso(url, token).map(|s| Box::new(s) as Box<dyn StorageProvider>)
        }
    };

    match opened {
        Ok(storage) => {
            info!(mode = mode.name(), "Storage ready");
            storage
        }
        Err(e) => {
            warn!(mode = mode.name(), error = %e, "Storage unavailable, watchlist will not persist");
            Box::new(MemoryStorage::new())
        }
    }
}
