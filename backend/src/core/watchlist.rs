use crate::core::models::Item;
use crate::core::storage::{StorageError, StorageProvider};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Durable key the favorites live under.
pub const WATCHLIST_KEY: &str = "movie-favorites";

type Subscriber = Box<dyn Fn(&[Item]) + Send>;

/// The user's favorites: an insertion-ordered set of items keyed by `id`,
/// mirrored in full to durable storage after every change.
///
/// Persistence failures never fail a mutation. The in-memory collection is
/// the source of truth for the session; a failed write is only logged.
pub struct Watchlist<S: StorageProvider> {
    items: Vec<Item>,
    storage: S,
    key: String,
    subscribers: Vec<Subscriber>,
}

impl<S: StorageProvider> Watchlist<S> {
    pub fn initialize(storage: S) -> Self {
        Self::initialize_with_key(storage, WATCHLIST_KEY)
    }

    /// Hydrates from `key`. Missing, unreadable or malformed data all yield an
    /// empty watchlist.
    pub fn initialize_with_key(storage: S, key: &str) -> Self {
        let items = match load(&storage, key) {
            Ok(items) => items,
            Err(e) => {
                warn!(key, error = %e, "Stored watchlist unusable, starting empty");
                Vec::new()
            }
        };
        debug!(key, count = items.len(), "Watchlist hydrated");

        Self {
            items,
            storage,
            key: key.to_string(),
            subscribers: Vec::new(),
        }
    }

    pub fn query(&self) -> &[Item] {
        &self.items
    }

    pub fn contains(&self, item_id: u64) -> bool {
        self.items.iter().any(|item| item.id == item_id)
    }

    #[allow(dead_code)]
    pub fn get(&self, item_id: u64) -> Option<&Item> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Appends `item` unless its id is already present.
    pub fn add(&mut self, item: Item) -> &[Item] {
        if self.contains(item.id) {
            return &self.items;
        }
        debug!(id = item.id, title = %item.title, "Adding to watchlist");
        self.items.push(item);
        self.changed();
        &self.items
    }

    pub fn remove(&mut self, item_id: u64) -> &[Item] {
        let before = self.items.len();
        self.items.retain(|item| item.id != item_id);
        if self.items.len() != before {
            debug!(id = item_id, "Removed from watchlist");
            self.changed();
        }
        &self.items
    }

    /// Rewrites the whole collection under the durable key.
    pub fn persist(&self) -> Result<(), StorageError> {
        let json = serde_json::to_string(&self.items)?;
        self.storage.write(&self.key, &json)
    }

    /// Registers a callback run with the new collection after every change.
    pub fn subscribe(&mut self, subscriber: impl Fn(&[Item]) + Send + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    fn changed(&mut self) {
        if let Err(e) = self.persist() {
            warn!(key = %self.key, error = %e, "Watchlist persist failed, change kept in memory only");
        }
        for subscriber in &self.subscribers {
            subscriber(&self.items);
        }
    }
}

fn load<S: StorageProvider>(storage: &S, key: &str) -> Result<Vec<Item>, StorageError> {
    let Some(raw) = storage.read(key)? else {
        return Ok(Vec::new());
    };
    let stored: Vec<Item> = serde_json::from_str(&raw)?;

    // Hand-edited or legacy data may repeat ids; first occurrence wins.
    let mut seen = HashSet::new();
    Ok(stored.into_iter().filter(|item| seen.insert(item.id)).collect())
}
