use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const POSTER_BASE: &str = "https://image.tmdb.org/t/p/w500";
pub const PLACEHOLDER_POSTER: &str = "https://placehold.co/500x750/e2e8f0/e2e8f0?text=No+Image";

/// Which catalog namespace an item came from. Attached from the endpoint that
/// produced the item, never guessed from the payload shape.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
pub enum MediaKind {
    #[serde(rename = "movie")]
    Movie,
    #[serde(rename = "tv")]
    Show,
}

impl MediaKind {
    /// Path segment used both by the catalog API and by our own routes.
    pub fn as_path(self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Show => "tv",
        }
    }

    fn title_field(self) -> &'static str {
        match self {
            MediaKind::Movie => "title",
            MediaKind::Show => "name",
        }
    }

    fn date_field(self) -> &'static str {
        match self {
            MediaKind::Movie => "release_date",
            MediaKind::Show => "first_air_date",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_path())
    }
}

impl FromStr for MediaKind {
    type Err = ItemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaKind::Movie),
            "tv" | "show" => Ok(MediaKind::Show),
            other => Err(ItemError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ItemError {
    #[error("Catalog payload is not an object")]
    NotAnObject,

    #[error("Catalog payload is missing `{0}`")]
    MissingField(&'static str),

    #[error("Unknown media kind: {0}")]
    UnknownKind(String),
}

/// A movie or show as handed to views and stored in the watchlist.
///
/// `extra` carries every raw catalog field we do not model, so persisting an
/// item keeps the whole catalog object rather than a projection of it.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Item {
    pub id: u64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<String>,
    pub media_type: MediaKind,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Item {
    #[allow(dead_code)]
    pub fn new(id: u64, title: impl Into<String>, media_type: MediaKind) -> Self {
        Self {
            id,
            title: title.into(),
            release_date: None,
            poster_path: None,
            media_type,
            extra: Map::new(),
        }
    }

    /// Normalizes a raw catalog object. Movies carry `title`/`release_date`,
    /// shows carry `name`/`first_air_date`; both end up in the same fields.
    pub fn from_catalog(kind: MediaKind, raw: Value) -> Result<Self, ItemError> {
        let Value::Object(mut fields) = raw else {
            return Err(ItemError::NotAnObject);
        };

        let id = fields
            .remove("id")
            .and_then(|v| v.as_u64())
            .ok_or(ItemError::MissingField("id"))?;

        let title = match fields.remove(kind.title_field()) {
            Some(Value::String(t)) => t,
            _ => return Err(ItemError::MissingField(kind.title_field())),
        };

        let release_date = take_text(&mut fields, kind.date_field());
        let poster_path = take_text(&mut fields, "poster_path");

        // Never let raw keys shadow the normalized ones when flattened back out.
        for key in ["title", "release_date", "poster_path", "media_type"] {
            fields.remove(key);
        }

        Ok(Self {
            id,
            title,
            release_date,
            poster_path,
            media_type: kind,
            extra: fields,
        })
    }

    pub fn poster_url(&self) -> String {
        match self.poster_path.as_deref() {
            Some(p) if !p.is_empty() => format!("{POSTER_BASE}{p}"),
            _ => PLACEHOLDER_POSTER.to_string(),
        }
    }

    /// Detail page path, e.g. `/movie/438631`.
    pub fn link(&self) -> String {
        format!("/{}/{}", self.media_type.as_path(), self.id)
    }

    /// A raw string field such as `overview` or `tagline`, if non-empty.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.extra
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

fn take_text(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}
