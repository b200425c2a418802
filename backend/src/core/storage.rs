use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Data serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Data file corruption: {0}")]
    Corruption(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Durable key/value storage, the server-side stand-in for browser local
/// storage. Values are opaque strings; callers own their encoding.
pub trait StorageProvider: Send {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

impl<S: StorageProvider + ?Sized> StorageProvider for Box<S> {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).write(key, value)
    }
}

impl<S: StorageProvider + Sync + ?Sized> StorageProvider for Arc<S> {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).write(key, value)
    }
}

/// Volatile backend for tests and for running without a data directory.
#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a raw value, bypassing any encoding.
    #[cfg(test)]
    pub fn with_value(key: &str, value: &str) -> Self {
        let storage = Self::new();
        storage
            .values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        storage
    }
}

impl StorageProvider for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self
            .values
            .lock()
            .map_err(|e| StorageError::Corruption(e.to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| StorageError::Corruption(e.to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
