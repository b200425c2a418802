use crate::core::models::{Item, MediaKind};
use thiserror::Error;

/// How many top-rated titles a view shows per kind.
pub const TOP_PICKS: usize = 5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("Catalog API key is not configured")]
    NotConfigured,

    #[error("{message}")]
    Network { message: String, status: Option<u16> },

    #[error("Catalog request timed out")]
    Timeout,

    #[error("Parse error: {0}")]
    Parse(String),
}

impl CatalogError {
    pub fn status(&self) -> Option<u16> {
        match self {
            CatalogError::Network { status, .. } => *status,
            _ => None,
        }
    }

    /// Short machine-readable label for error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            CatalogError::NotConfigured => "not_configured",
            CatalogError::Network { .. } => "network",
            CatalogError::Timeout => "timeout",
            CatalogError::Parse(_) => "parse",
        }
    }
}

/// Read access to the third-party media catalog.
pub trait CatalogClient: Send + Sync {
    fn name(&self) -> &str;

    /// Free-text title search. A blank query yields no results and no request.
    fn search(&self, query: &str) -> Result<Vec<Item>, CatalogError>;

    fn top_rated(&self, kind: MediaKind) -> Result<Vec<Item>, CatalogError>;

    fn details(&self, id: u64, kind: MediaKind) -> Result<Item, CatalogError>;
}

/// The first [`TOP_PICKS`] entries of the top-rated list for `kind`.
pub fn top_picks(client: &dyn CatalogClient, kind: MediaKind) -> Result<Vec<Item>, CatalogError> {
    let mut items = client.top_rated(kind)?;
    items.truncate(TOP_PICKS);
    Ok(items)
}
