use crate::infra::tmdb::DEFAULT_BASE_URL;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PORT: u16 = 3001;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogConfig {
    /// `None` keeps the app usable with catalog calls disabled.
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

/// Where the watchlist is made durable.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageMode {
    File { dir: PathBuf },
    Local { path: String },
    Turso { url: String, token: String },
}

impl StorageMode {
    pub fn name(&self) -> &'static str {
        match self {
            StorageMode::File { .. } => "file",
            StorageMode::Local { .. } => "local",
            StorageMode::Turso { .. } => "turso",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub storage: StorageMode,
    pub port: u16,
}

impl Config {
    /// Reads the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Missing .env is fine; production uses real env vars.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let timeout_secs = match var("CATALOG_TIMEOUT_SECS") {
            Some(raw) => parse_number::<u64>("CATALOG_TIMEOUT_SECS", &raw)?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let catalog = CatalogConfig {
            api_key: var("TMDB_API_KEY"),
            base_url: var("TMDB_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            timeout: Duration::from_secs(timeout_secs),
        };

        let storage = match var("STORAGE_MODE").as_deref().unwrap_or("file") {
            "file" => StorageMode::File {
                dir: PathBuf::from(var("DATA_DIR").unwrap_or_else(|| "data".into())),
            },
            "local" => StorageMode::Local {
                path: var("DATABASE_PATH").unwrap_or_else(|| "data/moviefinder.db".into()),
            },
            "turso" => StorageMode::Turso {
                url: var("TURSO_DATABASE_URL").ok_or(ConfigError::Missing("TURSO_DATABASE_URL"))?,
                token: var("TURSO_AUTH_TOKEN").ok_or(ConfigError::Missing("TURSO_AUTH_TOKEN"))?,
            },
            other => {
                return Err(ConfigError::Invalid {
                    var: "STORAGE_MODE",
                    value: other.to_string(),
                });
            }
        };

        let port = match var("PORT") {
            Some(raw) => parse_number::<u16>("PORT", &raw)?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            catalog,
            storage,
            port,
        })
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        value: raw.to_string(),
    })
}
