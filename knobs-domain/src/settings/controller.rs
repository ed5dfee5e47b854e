//! The settings controller: the single read/write surface for setting values.
//!
//! A [`SettingsController`] owns the live value cache, validates and persists
//! writes, keeps a bounded undo history and fans changes out to per-key
//! streams, a global change stream and direct listeners.
//!
//! Its lifecycle is `Uninitialized -> Initialized -> Disposed`. Every
//! operation other than [`init`](SettingsController::init) and
//! [`dispose`](SettingsController::dispose) fails with
//! [`SettingsError::NotInitialized`] before `init()` and with
//! [`SettingsError::Disposed`] afterwards.
//!
//! Internal state sits behind a `std::sync::RwLock` that is never held across
//! an `.await`. Two overlapping `set()` calls on the same key are therefore
//! not serialized against each other; sequential awaited calls apply and
//! notify in program order.

use knobs_core::config::{ConfigLoader, CoreConfig};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use super::definition::{Setting, SettingDefinition, SettingKind};
use super::events::{ListenerId, SettingChangedEvent, SettingStream};
use super::registry::SharedRegistry;
use super::storage::{self, JsonFileStorage, SettingsStorage};
use super::types::{SettingValue, StoredValue};
use super::undo::{UndoEntry, UndoStack};
use crate::error::{SettingsError, StorageError};

type Listener = Arc<dyn Fn(&SettingChangedEvent) + Send + Sync>;

/// Result of a single write through [`SettingsController::set_detailed`].
#[derive(Debug)]
pub enum SetOutcome {
    /// The value changed and was persisted (when the setting persists).
    Applied,
    /// The value equalled the current one; nothing happened.
    Unchanged,
    /// Type rule, constraint or custom validator refused the value.
    Rejected,
    /// The storage write failed; nothing was mutated.
    StorageFailed(StorageError),
}

impl SetOutcome {
    /// `true` for `Applied` and `Unchanged`.
    pub fn is_success(&self) -> bool {
        matches!(self, SetOutcome::Applied | SetOutcome::Unchanged)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Initialized,
    Disposed,
}

struct ControllerState {
    lifecycle: Lifecycle,
    cache: HashMap<String, SettingValue>,
    undo: UndoStack,
    key_channels: HashMap<String, broadcast::Sender<SettingValue>>,
    changes: Option<broadcast::Sender<SettingChangedEvent>>,
    can_undo: Option<watch::Sender<bool>>,
    listeners: HashMap<String, Vec<(ListenerId, Listener)>>,
}

impl ControllerState {
    fn check(&self) -> Result<(), SettingsError> {
        match self.lifecycle {
            Lifecycle::Initialized => Ok(()),
            Lifecycle::Uninitialized => Err(SettingsError::NotInitialized),
            Lifecycle::Disposed => Err(SettingsError::Disposed),
        }
    }

    fn current_value(&self, definition: &SettingDefinition) -> SettingValue {
        self.cache
            .get(definition.key())
            .cloned()
            .unwrap_or_else(|| definition.default_value().clone())
    }

    fn publish_can_undo(&self) {
        if let Some(tx) = &self.can_undo {
            let can_undo = !self.undo.is_empty();
            tx.send_if_modified(|current| {
                let changed = *current != can_undo;
                *current = can_undo;
                changed
            });
        }
    }
}

/// Live values for every setting in a [`SharedRegistry`], backed by a
/// [`SettingsStorage`].
///
/// Construct with [`new`](Self::new) or [`from_config`](Self::from_config),
/// call [`init`](Self::init) once, then read and write through typed
/// [`Setting`] handles.
pub struct SettingsController {
    registry: SharedRegistry,
    storage: Arc<dyn SettingsStorage>,
    state: RwLock<ControllerState>,
    broadcast_capacity: usize,
    next_listener_id: AtomicU64,
}

impl SettingsController {
    /// Creates an uninitialized controller. `broadcast_capacity` bounds every
    /// change channel; a lagging receiver skips what it missed.
    pub fn new(
        registry: SharedRegistry,
        storage: Arc<dyn SettingsStorage>,
        broadcast_capacity: usize,
    ) -> Self {
        let capacity = broadcast_capacity.max(1);
        let (changes, _) = broadcast::channel(capacity);
        let (can_undo, _) = watch::channel(false);
        Self {
            registry,
            storage,
            state: RwLock::new(ControllerState {
                lifecycle: Lifecycle::Uninitialized,
                cache: HashMap::new(),
                undo: UndoStack::new(),
                key_channels: HashMap::new(),
                changes: Some(changes),
                can_undo: Some(can_undo),
                listeners: HashMap::new(),
            }),
            broadcast_capacity: capacity,
            next_listener_id: AtomicU64::new(1),
        }
    }

    /// Builds a controller backed by a [`JsonFileStorage`] at the configured
    /// path, using the configured channel capacity.
    pub fn from_config(registry: SharedRegistry, config: &CoreConfig) -> Result<Self, SettingsError> {
        let path = ConfigLoader::resolve_storage_path(&config.storage)?;
        debug!("SettingsController: using settings file {:?}", path);
        Ok(Self::new(
            registry,
            Arc::new(JsonFileStorage::new(path)),
            config.events.broadcast_capacity,
        ))
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ControllerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ControllerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_ready(&self) -> Result<(), SettingsError> {
        self.read_state().check()
    }

    fn lookup_definition(&self, key: &str) -> Option<Arc<SettingDefinition>> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .definition(key)
    }

    /// Initializes storage and loads every persisted value into the cache.
    ///
    /// Stored values that cannot be decoded or fail validation are skipped
    /// with a warning so the setting reads its default. Calling `init()` on an
    /// initialized controller is a no-op.
    pub async fn init(&self) -> Result<(), SettingsError> {
        match self.read_state().lifecycle {
            Lifecycle::Initialized => return Ok(()),
            Lifecycle::Disposed => return Err(SettingsError::Disposed),
            Lifecycle::Uninitialized => {}
        }

        self.storage.init().await?;

        let definitions: Vec<Arc<SettingDefinition>> = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .definitions()
            .filter(|d| d.persist())
            .cloned()
            .collect();

        let mut loaded = HashMap::new();
        for definition in definitions {
            let key = definition.key();
            let kind = definition.setting_type().stored_kind();
            match storage::read_stored(self.storage.as_ref(), key, kind).await {
                Ok(None) => {}
                Ok(Some(stored)) => match definition.decode(&stored) {
                    Some(value) if definition.validate(&value) => {
                        loaded.insert(key.to_string(), value);
                    }
                    Some(value) => {
                        warn!("Stored value {:?} for '{}' is invalid, using default.", value, key);
                    }
                    None => {
                        warn!("Stored value {:?} for '{}' cannot be decoded, using default.", stored, key);
                    }
                },
                Err(e) => {
                    warn!("Failed to read stored value for '{}', using default: {}", key, e);
                }
            }
        }

        let mut state = self.write_state();
        match state.lifecycle {
            Lifecycle::Initialized => return Ok(()),
            Lifecycle::Disposed => return Err(SettingsError::Disposed),
            Lifecycle::Uninitialized => {}
        }
        info!("SettingsController initialized with {} stored values.", loaded.len());
        state.cache = loaded;
        state.lifecycle = Lifecycle::Initialized;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.read_state().lifecycle == Lifecycle::Initialized
    }

    /// Current value, or the default when nothing was set or loaded.
    pub fn get<T: SettingKind>(&self, setting: &Setting<T>) -> Result<T, SettingsError> {
        let state = self.read_state();
        state.check()?;
        Ok(state
            .cache
            .get(setting.key())
            .and_then(T::from_value)
            .unwrap_or_else(|| setting.default_value()))
    }

    /// Untyped read of a registered setting.
    pub fn value_of(&self, key: &str) -> Result<SettingValue, SettingsError> {
        self.ensure_ready()?;
        let definition = self.lookup_definition(key).ok_or_else(|| SettingsError::NotFound {
            key: key.to_string(),
        })?;
        Ok(self.read_state().current_value(&definition))
    }

    /// Evaluates `depends_on`/`enabled_when` against the current parent value.
    /// A setting without a dependency, or whose parent is not registered, is
    /// enabled.
    pub fn is_enabled(&self, definition: &SettingDefinition) -> Result<bool, SettingsError> {
        self.ensure_ready()?;
        let Some(parent_key) = definition.depends_on() else {
            return Ok(true);
        };
        match self.value_of(parent_key) {
            Ok(parent_value) => Ok(definition.is_enabled_by(&parent_value)),
            Err(SettingsError::NotFound { .. }) => Ok(true),
            Err(e) => Err(e),
        }
    }

    /// Validates, persists, records undo and notifies. Returns `false` when
    /// the value is rejected or storage fails.
    pub async fn set<T: SettingKind>(&self, setting: &Setting<T>, value: T) -> Result<bool, SettingsError> {
        self.set_with(setting, value, true, true).await
    }

    pub async fn set_with<T: SettingKind>(
        &self,
        setting: &Setting<T>,
        value: T,
        notify: bool,
        track_undo: bool,
    ) -> Result<bool, SettingsError> {
        Ok(self
            .set_detailed(setting, value, notify, track_undo)
            .await?
            .is_success())
    }

    /// Same as [`set_with`](Self::set_with) but reports why a write did not apply.
    pub async fn set_detailed<T: SettingKind>(
        &self,
        setting: &Setting<T>,
        value: T,
        notify: bool,
        track_undo: bool,
    ) -> Result<SetOutcome, SettingsError> {
        self.apply(setting.definition(), value.into_value(), notify, track_undo)
            .await
    }

    async fn apply(
        &self,
        definition: &Arc<SettingDefinition>,
        value: SettingValue,
        notify: bool,
        track_undo: bool,
    ) -> Result<SetOutcome, SettingsError> {
        let key = definition.key();
        let old_value = {
            let state = self.read_state();
            state.check()?;
            state.current_value(definition)
        };

        if !definition.validate(&value) {
            debug!("Rejected value {:?} for '{}'", value, key);
            return Ok(SetOutcome::Rejected);
        }
        if old_value == value {
            return Ok(SetOutcome::Unchanged);
        }
        let Some(stored) = definition.encode(&value) else {
            return Ok(SetOutcome::Rejected);
        };

        if definition.persist() {
            if let Err(e) = storage::write_stored(self.storage.as_ref(), key, &stored).await {
                warn!("Failed to persist '{}': {}", key, e);
                return Ok(SetOutcome::StorageFailed(e));
            }
        }

        let event = {
            let mut state = self.write_state();
            state.check()?;
            if track_undo {
                if let Some(evicted) = state.undo.push(UndoEntry::new(key, old_value.clone())) {
                    debug!("Undo history full, evicted entry for '{}'", evicted.setting_key);
                }
                state.publish_can_undo();
            }
            state.cache.insert(key.to_string(), value.clone());
            SettingChangedEvent::new(key, old_value, value)
        };
        debug!("Setting '{}' updated.", key);

        if notify {
            self.publish(vec![event]);
        }
        Ok(SetOutcome::Applied)
    }

    /// Fans events out to key channels, the global stream and listeners.
    /// Listeners run after the state lock is released.
    fn publish(&self, events: Vec<SettingChangedEvent>) {
        let mut callbacks: Vec<(Listener, SettingChangedEvent)> = Vec::new();
        {
            let state = self.read_state();
            for event in events {
                if let Some(tx) = state.key_channels.get(&event.key) {
                    if tx.send(event.new_value.clone()).is_err() {
                        debug!("No active stream for '{}'", event.key);
                    }
                }
                if let Some(listeners) = state.listeners.get(&event.key) {
                    for (_, listener) in listeners {
                        callbacks.push((Arc::clone(listener), event.clone()));
                    }
                }
                if let Some(tx) = &state.changes {
                    if tx.send(event).is_err() {
                        debug!("No active subscriber on the global change stream");
                    }
                }
            }
        }
        for (listener, event) in callbacks {
            listener(&event);
        }
    }

    /// Reverts the most recent tracked write.
    ///
    /// Returns `false` when the history is empty or the setting has since
    /// been unregistered (the entry is dropped). The restored value skips
    /// validation and does not create a new undo entry.
    pub async fn undo(&self) -> Result<bool, SettingsError> {
        let entry = {
            let mut state = self.write_state();
            state.check()?;
            let entry = state.undo.pop();
            state.publish_can_undo();
            entry
        };
        let Some(entry) = entry else {
            return Ok(false);
        };

        let definition = match self.lookup_definition(&entry.setting_key) {
            Some(def) if def.setting_type() == entry.previous_value.setting_type() => def,
            _ => {
                warn!(
                    "Dropping undo entry for '{}': setting is no longer registered.",
                    entry.setting_key
                );
                return Ok(false);
            }
        };
        let key = definition.key();

        let old_value = self.read_state().current_value(&definition);
        if old_value == entry.previous_value {
            return Ok(true);
        }
        let Some(stored) = definition.encode(&entry.previous_value) else {
            return Ok(false);
        };

        if definition.persist() {
            if let Err(e) = storage::write_stored(self.storage.as_ref(), key, &stored).await {
                warn!("Failed to persist undo of '{}': {}", key, e);
                let mut state = self.write_state();
                state.undo.push(entry);
                state.publish_can_undo();
                return Ok(false);
            }
        }

        let event = {
            let mut state = self.write_state();
            state.check()?;
            state
                .cache
                .insert(key.to_string(), entry.previous_value.clone());
            SettingChangedEvent::new(key, old_value, entry.previous_value)
        };
        debug!("Undid last change to '{}'.", key);
        self.publish(vec![event]);
        Ok(true)
    }

    pub fn can_undo(&self) -> Result<bool, SettingsError> {
        let state = self.read_state();
        state.check()?;
        Ok(!state.undo.is_empty())
    }

    /// Number of entries currently in the undo history.
    pub fn undo_depth(&self) -> Result<usize, SettingsError> {
        let state = self.read_state();
        state.check()?;
        Ok(state.undo.len())
    }

    /// Watch channel tracking [`can_undo`](Self::can_undo).
    pub fn can_undo_stream(&self) -> Result<watch::Receiver<bool>, SettingsError> {
        let state = self.read_state();
        state.check()?;
        state
            .can_undo
            .as_ref()
            .map(watch::Sender::subscribe)
            .ok_or(SettingsError::Disposed)
    }

    /// Restores the default and removes the stored entry. Not undoable.
    pub async fn reset<T: SettingKind>(&self, setting: &Setting<T>) -> Result<(), SettingsError> {
        self.ensure_ready()?;
        let definition = setting.definition();
        if definition.persist() {
            self.storage.remove(definition.key()).await?;
        }
        let event = {
            let mut state = self.write_state();
            state.check()?;
            let old_value = state.current_value(definition);
            state.cache.remove(definition.key());
            (old_value != *definition.default_value()).then(|| {
                SettingChangedEvent::new(
                    definition.key(),
                    old_value,
                    definition.default_value().clone(),
                )
            })
        };
        if let Some(event) = event {
            self.publish(vec![event]);
        }
        Ok(())
    }

    /// Resets every registered setting and clears the undo history.
    pub async fn reset_all(&self) -> Result<(), SettingsError> {
        self.ensure_ready()?;
        let definitions: Vec<Arc<SettingDefinition>> = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .definitions()
            .cloned()
            .collect();

        for definition in definitions.iter().filter(|d| d.persist()) {
            self.storage.remove(definition.key()).await?;
        }

        let events: Vec<SettingChangedEvent> = {
            let mut state = self.write_state();
            state.check()?;
            let events = definitions
                .iter()
                .filter_map(|definition| {
                    let old_value = state.current_value(definition);
                    (old_value != *definition.default_value()).then(|| {
                        SettingChangedEvent::new(
                            definition.key(),
                            old_value,
                            definition.default_value().clone(),
                        )
                    })
                })
                .collect();
            state.cache.clear();
            state.undo.clear();
            state.publish_can_undo();
            events
        };
        info!("Reset all settings, {} values changed.", events.len());
        self.publish(events);
        Ok(())
    }

    /// Storable form of every persisted setting, defaults included.
    pub fn export_all(&self) -> Result<BTreeMap<String, StoredValue>, SettingsError> {
        let definitions: Vec<Arc<SettingDefinition>> = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .definitions()
            .filter(|d| d.persist())
            .cloned()
            .collect();

        let state = self.read_state();
        state.check()?;
        Ok(definitions
            .iter()
            .filter_map(|definition| {
                let value = state.current_value(definition);
                definition
                    .encode(&value)
                    .map(|stored| (definition.key().to_string(), stored))
            })
            .collect())
    }

    /// Applies every entry naming a registered setting whose value decodes and
    /// validates; other entries are skipped. Returns how many values changed,
    /// so entries equal to the current value are not counted.
    pub async fn import_all<I, K>(&self, values: I) -> Result<usize, SettingsError>
    where
        I: IntoIterator<Item = (K, StoredValue)>,
        K: AsRef<str>,
    {
        self.ensure_ready()?;
        let mut applied = 0;
        for (key, stored) in values {
            let key = key.as_ref();
            let Some(definition) = self.lookup_definition(key) else {
                debug!("Import: skipping unregistered key '{}'", key);
                continue;
            };
            let Some(value) = definition.decode(&stored) else {
                debug!("Import: skipping undecodable value for '{}'", key);
                continue;
            };
            if matches!(
                self.apply(&definition, value, true, true).await?,
                SetOutcome::Applied
            ) {
                applied += 1;
            }
        }
        info!("Imported {} settings.", applied);
        Ok(applied)
    }

    /// [`export_all`](Self::export_all) as a pretty-printed JSON object.
    pub fn export_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(&self.export_all()?)?)
    }

    /// Imports a JSON object of key to value. Entries whose value is not a
    /// storable primitive are skipped like any other invalid entry.
    pub async fn import_json(&self, json: &str) -> Result<usize, SettingsError> {
        let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;
        let values: Vec<(String, StoredValue)> = object
            .into_iter()
            .filter_map(|(key, raw)| match serde_json::from_value::<StoredValue>(raw) {
                Ok(stored) => Some((key, stored)),
                Err(_) => {
                    debug!("Import: value for '{}' is not storable", key);
                    None
                }
            })
            .collect();
        self.import_all(values).await
    }

    fn key_sender(&self, key: &str) -> Result<broadcast::Sender<SettingValue>, SettingsError> {
        let mut state = self.write_state();
        state.check()?;
        let capacity = self.broadcast_capacity;
        Ok(state
            .key_channels
            .entry(key.to_string())
            .or_insert_with(|| broadcast::channel(capacity).0)
            .clone())
    }

    /// Values written after this call.
    pub fn stream<T: SettingKind>(&self, setting: &Setting<T>) -> Result<SettingStream<T>, SettingsError> {
        let receiver = self.key_sender(setting.key())?.subscribe();
        Ok(SettingStream::new(receiver, None))
    }

    /// The current value first, then values written after this call.
    pub fn stream_with_current<T: SettingKind>(
        &self,
        setting: &Setting<T>,
    ) -> Result<SettingStream<T>, SettingsError> {
        let receiver = self.key_sender(setting.key())?.subscribe();
        let current = self.get(setting)?;
        Ok(SettingStream::new(receiver, Some(current)))
    }

    /// Every accepted write, across all settings.
    pub fn changes(&self) -> Result<broadcast::Receiver<SettingChangedEvent>, SettingsError> {
        let state = self.read_state();
        state.check()?;
        state
            .changes
            .as_ref()
            .map(broadcast::Sender::subscribe)
            .ok_or(SettingsError::Disposed)
    }

    /// Registers a callback for changes to `key`. Callbacks run synchronously
    /// on the writing task, after the write has been applied.
    pub fn add_listener(
        &self,
        key: impl Into<String>,
        listener: impl Fn(&SettingChangedEvent) + Send + Sync + 'static,
    ) -> Result<ListenerId, SettingsError> {
        let mut state = self.write_state();
        state.check()?;
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        state
            .listeners
            .entry(key.into())
            .or_default()
            .push((id, Arc::new(listener)));
        Ok(id)
    }

    /// Returns whether a listener with `id` was registered.
    pub fn remove_listener(&self, id: ListenerId) -> Result<bool, SettingsError> {
        let mut state = self.write_state();
        state.check()?;
        let mut removed = false;
        state.listeners.retain(|_, listeners| {
            let before = listeners.len();
            listeners.retain(|(listener_id, _)| *listener_id != id);
            removed |= listeners.len() != before;
            !listeners.is_empty()
        });
        Ok(removed)
    }

    /// Whether storage currently holds an entry for the setting.
    pub async fn has_stored_value<T: SettingKind>(&self, setting: &Setting<T>) -> Result<bool, SettingsError> {
        self.ensure_ready()?;
        Ok(self.storage.contains_key(setting.key()).await?)
    }

    /// Closes every stream and drops all listeners. The controller cannot be
    /// used afterwards.
    pub fn dispose(&self) {
        let mut state = self.write_state();
        if state.lifecycle == Lifecycle::Disposed {
            return;
        }
        state.lifecycle = Lifecycle::Disposed;
        state.key_channels.clear();
        state.changes = None;
        state.can_undo = None;
        state.listeners.clear();
        state.cache.clear();
        state.undo.clear();
        debug!("SettingsController disposed.");
    }
}
