//! Storage backends for setting values.
//!
//! The controller talks to storage only through [`SettingsStorage`]. Two
//! backends ship with the crate: [`InMemoryStorage`] for tests and ephemeral
//! use, and [`JsonFileStorage`] which keeps one JSON object per file.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tokio::fs as tokio_fs;
use tracing::{debug, warn};

use super::types::{StoredKind, StoredValue};
use crate::error::StorageError;

/// Asynchronous key/value backend for setting values.
///
/// Getters return `Ok(None)` for absent keys and
/// [`StorageError::WrongKind`] when the key holds another kind. `get_double`
/// also accepts stored integers.
#[async_trait]
pub trait SettingsStorage: Send + Sync {
    /// Prepares the backend. Called once by the controller's `init()`.
    async fn init(&self) -> Result<(), StorageError>;

    /// Re-reads the backing store, discarding unsaved state.
    async fn reload(&self) -> Result<(), StorageError>;

    async fn get_string(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set_string(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn get_int(&self, key: &str) -> Result<Option<i64>, StorageError>;
    async fn set_int(&self, key: &str, value: i64) -> Result<(), StorageError>;

    async fn get_double(&self, key: &str) -> Result<Option<f64>, StorageError>;
    async fn set_double(&self, key: &str, value: f64) -> Result<(), StorageError>;

    async fn get_bool(&self, key: &str) -> Result<Option<bool>, StorageError>;
    async fn set_bool(&self, key: &str, value: bool) -> Result<(), StorageError>;

    async fn get_string_list(&self, key: &str) -> Result<Option<Vec<String>>, StorageError>;
    async fn set_string_list(&self, key: &str, value: &[String]) -> Result<(), StorageError>;

    async fn contains_key(&self, key: &str) -> Result<bool, StorageError>;

    /// Removes a key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    async fn clear(&self) -> Result<(), StorageError>;

    async fn list_keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Reads `key` through the typed getter matching `kind`.
pub async fn read_stored(
    storage: &dyn SettingsStorage,
    key: &str,
    kind: StoredKind,
) -> Result<Option<StoredValue>, StorageError> {
    Ok(match kind {
        StoredKind::String => storage.get_string(key).await?.map(StoredValue::String),
        StoredKind::Int => storage.get_int(key).await?.map(StoredValue::Int),
        StoredKind::Double => storage.get_double(key).await?.map(StoredValue::Double),
        StoredKind::Bool => storage.get_bool(key).await?.map(StoredValue::Bool),
        StoredKind::StringList => storage
            .get_string_list(key)
            .await?
            .map(StoredValue::StringList),
    })
}

/// Writes `value` through the typed setter matching its kind.
pub async fn write_stored(
    storage: &dyn SettingsStorage,
    key: &str,
    value: &StoredValue,
) -> Result<(), StorageError> {
    match value {
        StoredValue::String(s) => storage.set_string(key, s).await,
        StoredValue::Int(i) => storage.set_int(key, *i).await,
        StoredValue::Double(d) => storage.set_double(key, *d).await,
        StoredValue::Bool(b) => storage.set_bool(key, *b).await,
        StoredValue::StringList(l) => storage.set_string_list(key, l).await,
    }
}

fn wrong_kind(key: &str, expected: StoredKind) -> StorageError {
    StorageError::WrongKind {
        key: key.to_string(),
        expected,
    }
}

/// Shared typed lookup over a map of stored values.
fn lookup<'a, T>(
    value: Option<&'a StoredValue>,
    key: &str,
    expected: StoredKind,
    extract: impl FnOnce(&'a StoredValue) -> Option<T>,
) -> Result<Option<T>, StorageError> {
    match value {
        None => Ok(None),
        Some(v) => extract(v).map(Some).ok_or_else(|| wrong_kind(key, expected)),
    }
}

fn as_string(v: &StoredValue) -> Option<String> {
    match v {
        StoredValue::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn as_int(v: &StoredValue) -> Option<i64> {
    match v {
        StoredValue::Int(i) => Some(*i),
        _ => None,
    }
}

fn as_double(v: &StoredValue) -> Option<f64> {
    match v {
        StoredValue::Double(d) => Some(*d),
        StoredValue::Int(i) => Some(*i as f64),
        _ => None,
    }
}

fn as_bool(v: &StoredValue) -> Option<bool> {
    match v {
        StoredValue::Bool(b) => Some(*b),
        _ => None,
    }
}

fn as_string_list(v: &StoredValue) -> Option<Vec<String>> {
    match v {
        StoredValue::StringList(l) => Some(l.clone()),
        _ => None,
    }
}

/// Volatile backend keeping values in a map.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    values: Mutex<HashMap<String, StoredValue>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-populated with `values`.
    pub fn with_values<I, K>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, StoredValue)>,
        K: Into<String>,
    {
        Self {
            values: Mutex::new(values.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }

    fn get(&self, key: &str) -> Option<StoredValue> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn put(&self, key: &str, value: StoredValue) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }
}

#[async_trait]
impl SettingsStorage for InMemoryStorage {
    async fn init(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn reload(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>, StorageError> {
        lookup(self.get(key).as_ref(), key, StoredKind::String, as_string)
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.put(key, StoredValue::String(value.to_string()));
        Ok(())
    }

    async fn get_int(&self, key: &str) -> Result<Option<i64>, StorageError> {
        lookup(self.get(key).as_ref(), key, StoredKind::Int, as_int)
    }

    async fn set_int(&self, key: &str, value: i64) -> Result<(), StorageError> {
        self.put(key, StoredValue::Int(value));
        Ok(())
    }

    async fn get_double(&self, key: &str) -> Result<Option<f64>, StorageError> {
        lookup(self.get(key).as_ref(), key, StoredKind::Double, as_double)
    }

    async fn set_double(&self, key: &str, value: f64) -> Result<(), StorageError> {
        self.put(key, StoredValue::Double(value));
        Ok(())
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>, StorageError> {
        lookup(self.get(key).as_ref(), key, StoredKind::Bool, as_bool)
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<(), StorageError> {
        self.put(key, StoredValue::Bool(value));
        Ok(())
    }

    async fn get_string_list(&self, key: &str) -> Result<Option<Vec<String>>, StorageError> {
        lookup(self.get(key).as_ref(), key, StoredKind::StringList, as_string_list)
    }

    async fn set_string_list(&self, key: &str, value: &[String]) -> Result<(), StorageError> {
        self.put(key, StoredValue::StringList(value.to_vec()));
        Ok(())
    }

    async fn contains_key(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key))
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// File backend holding all values in one JSON object.
///
/// The file is read on `init()`/`reload()`; every write is flushed at once
/// through a temporary file that is renamed over the original. A write that
/// fails leaves both the file and the in-memory view unchanged.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    values: tokio::sync::Mutex<BTreeMap<String, StoredValue>>,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            values: tokio::sync::Mutex::new(BTreeMap::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, StoredValue>, StorageError> {
        let content = match tokio_fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Settings file {:?} does not exist yet, starting empty.", self.path);
                return Ok(BTreeMap::new());
            }
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    async fn save(&self, values: &BTreeMap<String, StoredValue>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio_fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StorageError::io(parent, e))?;
            }
        }
        let content = serde_json::to_string_pretty(values)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio_fs::write(&tmp_path, content)
            .await
            .map_err(|e| StorageError::io(&tmp_path, e))?;
        if let Err(e) = tokio_fs::rename(&tmp_path, &self.path).await {
            warn!("Failed to move {:?} into place: {}", tmp_path, e);
            let _ = tokio_fs::remove_file(&tmp_path).await;
            return Err(StorageError::io(&self.path, e));
        }
        Ok(())
    }

    /// Applies `change` to a copy of the values, persists it, then commits.
    async fn update(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, StoredValue>),
    ) -> Result<(), StorageError> {
        let mut guard = self.values.lock().await;
        let mut next = guard.clone();
        change(&mut next);
        self.save(&next).await?;
        *guard = next;
        Ok(())
    }

    async fn get(&self, key: &str) -> Option<StoredValue> {
        self.values.lock().await.get(key).cloned()
    }

    async fn put(&self, key: &str, value: StoredValue) -> Result<(), StorageError> {
        self.update(|values| {
            values.insert(key.to_string(), value);
        })
        .await
    }
}

#[async_trait]
impl SettingsStorage for JsonFileStorage {
    async fn init(&self) -> Result<(), StorageError> {
        self.reload().await
    }

    async fn reload(&self) -> Result<(), StorageError> {
        let loaded = self.load().await?;
        debug!("Loaded {} stored values from {:?}", loaded.len(), self.path);
        *self.values.lock().await = loaded;
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>, StorageError> {
        lookup(self.get(key).await.as_ref(), key, StoredKind::String, as_string)
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.put(key, StoredValue::String(value.to_string())).await
    }

    async fn get_int(&self, key: &str) -> Result<Option<i64>, StorageError> {
        lookup(self.get(key).await.as_ref(), key, StoredKind::Int, as_int)
    }

    async fn set_int(&self, key: &str, value: i64) -> Result<(), StorageError> {
        self.put(key, StoredValue::Int(value)).await
    }

    async fn get_double(&self, key: &str) -> Result<Option<f64>, StorageError> {
        lookup(self.get(key).await.as_ref(), key, StoredKind::Double, as_double)
    }

    async fn set_double(&self, key: &str, value: f64) -> Result<(), StorageError> {
        if !value.is_finite() {
            return Err(StorageError::NonFiniteDouble {
                key: key.to_string(),
                value,
            });
        }
        self.put(key, StoredValue::Double(value)).await
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>, StorageError> {
        lookup(self.get(key).await.as_ref(), key, StoredKind::Bool, as_bool)
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<(), StorageError> {
        self.put(key, StoredValue::Bool(value)).await
    }

    async fn get_string_list(&self, key: &str) -> Result<Option<Vec<String>>, StorageError> {
        lookup(
            self.get(key).await.as_ref(),
            key,
            StoredKind::StringList,
            as_string_list,
        )
    }

    async fn set_string_list(&self, key: &str, value: &[String]) -> Result<(), StorageError> {
        self.put(key, StoredValue::StringList(value.to_vec())).await
    }

    async fn contains_key(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.values.lock().await.contains_key(key))
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        if !self.values.lock().await.contains_key(key) {
            return Ok(());
        }
        self.update(|values| {
            values.remove(key);
        })
        .await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.update(BTreeMap::clear).await
    }

    async fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.values.lock().await.keys().cloned().collect())
    }
}
