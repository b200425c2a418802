use crate::core::catalog::{CatalogClient, CatalogError};
use crate::core::models::{Item, MediaKind};
use crate::infra::config::CatalogConfig;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

// ── Response types ───────────────────────────────────────────────

/// Result objects stay raw so the whole payload survives into `Item::extra`.
#[derive(Deserialize)]
struct PagedResponse {
    results: Vec<Value>,
}

// ── Client ───────────────────────────────────────────────────────

pub struct TmdbClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl TmdbClient {
    /// Builds a client. A missing key is not an error here; every request
    /// fails with [`CatalogError::NotConfigured`] instead.
    pub fn new(
        api_key: Option<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(transport_error)?;

        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &CatalogConfig) -> Result<Self, CatalogError> {
        Self::new(config.api_key.clone(), &config.base_url, config.timeout)
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Response, CatalogError> {
        let key = self.api_key.as_deref().ok_or(CatalogError::NotConfigured)?;

        let url = format!("{}{path}", self.base_url);
        let request = self
            .client
            .get(&url)
            .query(&[("language", "en-US")])
            .query(params);

        // v4 read tokens are JWTs; v3 keys are plain hex and go in the query.
        let request = if key.contains('.') {
            request.bearer_auth(key)
        } else {
            request.query(&[("api_key", key)])
        };

        debug!(path, "TMDB request");
        let resp = request.send().map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            warn!(path, status = status.as_u16(), "TMDB request failed");
            return Err(CatalogError::Network {
                message: format!("API request failed with status {}", status.as_u16()),
                status: Some(status.as_u16()),
            });
        }
        Ok(resp)
    }

    fn list(
        &self,
        path: &str,
        kind: MediaKind,
        params: &[(&str, &str)],
    ) -> Result<Vec<Item>, CatalogError> {
        let page: PagedResponse = decode(self.get(path, params)?)?;

        let items = page
            .results
            .into_iter()
            .filter_map(|raw| match Item::from_catalog(kind, raw) {
                Ok(item) => Some(item),
                Err(e) => {
                    debug!(path, error = %e, "Skipping malformed catalog entry");
                    None
                }
            })
            .collect();

        Ok(items)
    }
}

fn transport_error(e: reqwest::Error) -> CatalogError {
    if e.is_timeout() {
        CatalogError::Timeout
    } else {
        CatalogError::Network {
            message: e.to_string(),
            status: e.status().map(|s| s.as_u16()),
        }
    }
}

/// Reads the body as JSON. The client timeout also covers the body, so a
/// stalled body is a timeout rather than a parse failure.
fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, CatalogError> {
    resp.json().map_err(|e| {
        if e.is_timeout() {
            CatalogError::Timeout
        } else {
            CatalogError::Parse(e.to_string())
        }
    })
}

impl CatalogClient for TmdbClient {
    fn name(&self) -> &str {
        "TMDB"
    }

    fn search(&self, query: &str) -> Result<Vec<Item>, CatalogError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.list(
            "/search/movie",
            MediaKind::Movie,
            &[("query", query), ("include_adult", "false"), ("page", "1")],
        )
    }

    fn top_rated(&self, kind: MediaKind) -> Result<Vec<Item>, CatalogError> {
        let path = format!("/{}/top_rated", kind.as_path());
        self.list(&path, kind, &[("page", "1")])
    }

    fn details(&self, id: u64, kind: MediaKind) -> Result<Item, CatalogError> {
        let path = format!("/{}/{id}", kind.as_path());
        let raw: Value = decode(self.get(&path, &[])?)?;
        Item::from_catalog(kind, raw).map_err(|e| CatalogError::Parse(e.to_string()))
    }
}
