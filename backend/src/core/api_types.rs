use serde::{Deserialize, Serialize};

use crate::core::catalog::CatalogError;
use crate::core::models::{Item, MediaKind};

/// Flat JSON card for the views.
/// Everything a card needs is resolved here so the frontend never re-derives it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ApiItem {
    pub id: u64,
    pub title: String,
    pub media_type: MediaKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    pub poster_url: String,
    pub link: String,
    pub favorite: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
}

impl ApiItem {
    pub fn from_item(item: &Item, favorite: bool) -> Self {
        ApiItem {
            id: item.id,
            title: item.title.clone(),
            media_type: item.media_type,
            release_date: item.release_date.clone(),
            poster_url: item.poster_url(),
            link: item.link(),
            favorite,
            tagline: item.text("tagline").map(String::from),
            overview: item.text("overview").map(String::from),
        }
    }

    /// Decorates a result list, asking `is_favorite` once per item.
    pub fn list(items: &[Item], is_favorite: impl Fn(u64) -> bool) -> Vec<Self> {
        items
            .iter()
            .map(|item| Self::from_item(item, is_favorite(item.id)))
            .collect()
    }
}

// ── Top rated ────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiTopRated {
    pub movies: Vec<ApiItem>,
    pub shows: Vec<ApiItem>,
}

// ── Errors as data ───────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ApiError {
    pub error: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ApiError {
    pub fn new(kind: &str, error: impl Into<String>) -> Self {
        ApiError {
            error: error.into(),
            kind: kind.to_string(),
            status: None,
        }
    }
}

impl From<&CatalogError> for ApiError {
    fn from(e: &CatalogError) -> Self {
        ApiError {
            error: e.to_string(),
            kind: e.kind().to_string(),
            status: e.status(),
        }
    }
}
