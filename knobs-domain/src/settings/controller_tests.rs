#![cfg(test)]
use super::controller::{SetOutcome, SettingsController};
use super::definition::Setting;
use super::events::SettingChangedEvent;
use super::registry::{SettingsRegistry, SharedRegistry};
use super::storage::{InMemoryStorage, SettingsStorage};
use super::types::{SettingValue, StoredValue};
use super::undo::UNDO_CAPACITY;
use crate::error::{SettingsError, StorageError};
use async_trait::async_trait;
use knobs_core::types::Color;
use mockall::mock;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

mock! {
    Storage {}

    #[async_trait]
    impl SettingsStorage for Storage {
        async fn init(&self) -> Result<(), StorageError>;
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
        async fn remove(&self, key: &str) -> Result<(), StorageError>;
        async fn clear(&self) -> Result<(), StorageError>;
        async fn list_keys(&self) -> Result<Vec<String>, StorageError>;
    }
}

struct Catalog {
    theme_mode: Setting<String>,
    notifications: Setting<bool>,
    font_size: Setting<i64>,
    accent: Setting<Color>,
    session_only: Setting<bool>,
}

impl Catalog {
    fn new() -> Self {
        Catalog {
            theme_mode: Setting::<String>::builder("theme_mode", "system".to_string())
                .search_terms("en", ["theme", "dark", "light"])
                .one_of(["system", "light", "dark"])
                .build(),
            notifications: Setting::<bool>::builder("notifications", true).build(),
            font_size: Setting::<i64>::builder("font_size", 14).range(8, 72).build(),
            accent: Setting::<Color>::builder("accent", Color::from_rgb(0x33, 0x66, 0xFF)).build(),
            session_only: Setting::<bool>::builder("session_only", false)
                .persist(false)
                .build(),
        }
    }

    fn registry(&self) -> SharedRegistry {
        let mut registry = SettingsRegistry::new();
        registry.register(&self.theme_mode);
        registry.register(&self.notifications);
        registry.register(&self.font_size);
        registry.register(&self.accent);
        registry.register(&self.session_only);
        registry.into_shared()
    }
}

struct TestContext {
    catalog: Catalog,
    registry: SharedRegistry,
    storage: Arc<InMemoryStorage>,
    controller: SettingsController,
    events: Arc<Mutex<Vec<SettingChangedEvent>>>,
}

impl TestContext {
    async fn new() -> Self {
        Self::with_storage(InMemoryStorage::new()).await
    }

    async fn with_storage(storage: InMemoryStorage) -> Self {
        let catalog = Catalog::new();
        let registry = catalog.registry();
        let storage = Arc::new(storage);
        let controller = SettingsController::new(registry.clone(), storage.clone(), 16);
        controller.init().await.unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        for key in ["theme_mode", "notifications", "font_size", "accent", "session_only"] {
            let events_clone = events.clone();
            controller
                .add_listener(key, move |event| events_clone.lock().unwrap().push(event.clone()))
                .unwrap();
        }

        TestContext {
            catalog,
            registry,
            storage,
            controller,
            events,
        }
    }

    fn get_events(&self) -> Vec<SettingChangedEvent> {
        self.events.lock().unwrap().clone()
    }
}

fn ok_none<T>() -> Result<Option<T>, StorageError> {
    Ok(None)
}

#[tokio::test]
async fn test_operations_before_init_fail() {
    let catalog = Catalog::new();
    let controller =
        SettingsController::new(catalog.registry(), Arc::new(InMemoryStorage::new()), 16);
    assert!(!controller.is_initialized());
    assert!(matches!(controller.get(&catalog.notifications), Err(SettingsError::NotInitialized)));
    assert!(matches!(
        controller.set(&catalog.notifications, false).await,
        Err(SettingsError::NotInitialized)
    ));
    assert!(matches!(controller.undo().await, Err(SettingsError::NotInitialized)));
    assert!(matches!(controller.changes(), Err(SettingsError::NotInitialized)));
}

#[tokio::test]
async fn test_defaults_after_init_and_init_is_idempotent() {
    let ctx = TestContext::new().await;
    assert!(ctx.controller.get(&ctx.catalog.notifications).unwrap());
    assert_eq!(ctx.controller.get(&ctx.catalog.theme_mode).unwrap(), "system");
    assert_eq!(ctx.controller.get(&ctx.catalog.font_size).unwrap(), 14);

    ctx.controller.set(&ctx.catalog.font_size, 20).await.unwrap();
    ctx.controller.init().await.unwrap();
    assert_eq!(ctx.controller.get(&ctx.catalog.font_size).unwrap(), 20);
}

#[tokio::test]
async fn test_init_loads_valid_and_skips_invalid_stored_values() {
    let storage = InMemoryStorage::with_values([
        ("theme_mode", StoredValue::from("dark")),
        ("font_size", StoredValue::Int(500)),
        ("notifications", StoredValue::from("yes")),
        ("accent", StoredValue::Int(0x8000_0000)),
    ]);
    let ctx = TestContext::with_storage(storage).await;
    assert_eq!(ctx.controller.get(&ctx.catalog.theme_mode).unwrap(), "dark");
    assert_eq!(ctx.controller.get(&ctx.catalog.font_size).unwrap(), 14);
    assert!(ctx.controller.get(&ctx.catalog.notifications).unwrap());
    assert_eq!(
        ctx.controller.get(&ctx.catalog.accent).unwrap(),
        Color::from_u32(0x8000_0000)
    );
}

#[tokio::test]
async fn test_set_get_persist_and_notify() {
    let ctx = TestContext::new().await;
    let mut changes = ctx.controller.changes().unwrap();

    assert!(ctx.controller.set(&ctx.catalog.notifications, false).await.unwrap());
    assert!(!ctx.controller.get(&ctx.catalog.notifications).unwrap());
    assert!(ctx.controller.has_stored_value(&ctx.catalog.notifications).await.unwrap());
    assert_eq!(ctx.storage.get_bool("notifications").await.unwrap(), Some(false));

    let expected = SettingChangedEvent::new(
        "notifications",
        SettingValue::Bool(true),
        SettingValue::Bool(false),
    );
    assert_eq!(changes.recv().await.unwrap(), expected);
    assert_eq!(ctx.get_events(), vec![expected]);
}

#[tokio::test]
async fn test_invalid_value_is_rejected_without_mutation() {
    let ctx = TestContext::new().await;
    assert!(!ctx.controller.set(&ctx.catalog.font_size, 200).await.unwrap());
    assert!(!ctx.controller.set(&ctx.catalog.theme_mode, "sepia".to_string()).await.unwrap());
    assert_eq!(ctx.controller.get(&ctx.catalog.font_size).unwrap(), 14);
    assert!(!ctx.controller.has_stored_value(&ctx.catalog.font_size).await.unwrap());
    assert!(!ctx.controller.can_undo().unwrap());
    assert!(ctx.get_events().is_empty());

    let outcome = ctx
        .controller
        .set_detailed(&ctx.catalog.font_size, 1, true, true)
        .await
        .unwrap();
    assert!(matches!(outcome, SetOutcome::Rejected));
}

#[tokio::test]
async fn test_setting_same_value_is_silent_success() {
    let ctx = TestContext::new().await;
    let outcome = ctx
        .controller
        .set_detailed(&ctx.catalog.notifications, true, true, true)
        .await
        .unwrap();
    assert!(matches!(outcome, SetOutcome::Unchanged));
    assert!(outcome.is_success());
    assert!(ctx.get_events().is_empty());
    assert!(!ctx.controller.can_undo().unwrap());
}

#[tokio::test]
async fn test_non_persisted_setting_never_reaches_storage() {
    let ctx = TestContext::new().await;
    assert!(ctx.controller.set(&ctx.catalog.session_only, true).await.unwrap());
    assert!(ctx.controller.get(&ctx.catalog.session_only).unwrap());
    assert!(!ctx.controller.has_stored_value(&ctx.catalog.session_only).await.unwrap());
    assert!(!ctx.controller.export_all().unwrap().contains_key("session_only"));
}

#[tokio::test]
async fn test_set_with_flags() {
    let ctx = TestContext::new().await;
    assert!(ctx
        .controller
        .set_with(&ctx.catalog.font_size, 16, false, false)
        .await
        .unwrap());
    assert_eq!(ctx.controller.get(&ctx.catalog.font_size).unwrap(), 16);
    assert!(ctx.get_events().is_empty());
    assert!(!ctx.controller.can_undo().unwrap());
}

#[tokio::test]
async fn test_undo_restores_previous_value_without_growing_stack() {
    let ctx = TestContext::new().await;
    let mut can_undo = ctx.controller.can_undo_stream().unwrap();
    assert!(!*can_undo.borrow());

    ctx.controller.set(&ctx.catalog.theme_mode, "dark".to_string()).await.unwrap();
    assert_eq!(ctx.controller.undo_depth().unwrap(), 1);
    can_undo.changed().await.unwrap();
    assert!(*can_undo.borrow());

    assert!(ctx.controller.undo().await.unwrap());
    assert_eq!(ctx.controller.get(&ctx.catalog.theme_mode).unwrap(), "system");
    assert_eq!(ctx.storage.get_string("theme_mode").await.unwrap(), Some("system".into()));
    assert_eq!(ctx.controller.undo_depth().unwrap(), 0);
    assert!(!ctx.controller.can_undo().unwrap());
    can_undo.changed().await.unwrap();
    assert!(!*can_undo.borrow());

    let events = ctx.get_events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].new_value, SettingValue::from("system"));

    assert!(!ctx.controller.undo().await.unwrap());
}

#[tokio::test]
async fn test_undo_history_is_bounded() {
    let ctx = TestContext::new().await;
    for size in 20..=(20 + UNDO_CAPACITY as i64 + 4) {
        assert!(ctx.controller.set(&ctx.catalog.font_size, size).await.unwrap());
        assert!(ctx.controller.undo_depth().unwrap() <= UNDO_CAPACITY);
    }
    assert_eq!(ctx.controller.undo_depth().unwrap(), UNDO_CAPACITY);

    let mut undone = 0;
    while ctx.controller.undo().await.unwrap() {
        undone += 1;
    }
    assert_eq!(undone, UNDO_CAPACITY);
    // The oldest entries were evicted, so the default is not reachable.
    assert_eq!(ctx.controller.get(&ctx.catalog.font_size).unwrap(), 24);
}

#[tokio::test]
async fn test_undo_drops_entry_of_unregistered_setting() {
    let ctx = TestContext::new().await;
    ctx.controller.set(&ctx.catalog.font_size, 30).await.unwrap();
    ctx.registry.write().unwrap().unregister("font_size");

    assert!(!ctx.controller.undo().await.unwrap());
    assert_eq!(ctx.controller.undo_depth().unwrap(), 0);
    assert_eq!(ctx.controller.get(&ctx.catalog.font_size).unwrap(), 30);
}

#[tokio::test]
async fn test_reset_restores_default_and_removes_stored_entry() {
    let ctx = TestContext::new().await;
    ctx.controller.set(&ctx.catalog.font_size, 30).await.unwrap();
    ctx.controller.reset(&ctx.catalog.font_size).await.unwrap();

    assert_eq!(ctx.controller.get(&ctx.catalog.font_size).unwrap(), 14);
    assert!(!ctx.controller.has_stored_value(&ctx.catalog.font_size).await.unwrap());
    assert_eq!(ctx.get_events().len(), 2);

    // Already at default: no event.
    ctx.controller.reset(&ctx.catalog.font_size).await.unwrap();
    assert_eq!(ctx.get_events().len(), 2);
}

#[tokio::test]
async fn test_reset_all_clears_values_and_undo() {
    let ctx = TestContext::new().await;
    ctx.controller.set(&ctx.catalog.font_size, 30).await.unwrap();
    ctx.controller.set(&ctx.catalog.notifications, false).await.unwrap();
    ctx.controller.set(&ctx.catalog.session_only, true).await.unwrap();

    ctx.controller.reset_all().await.unwrap();

    assert_eq!(ctx.controller.get(&ctx.catalog.font_size).unwrap(), 14);
    assert!(ctx.controller.get(&ctx.catalog.notifications).unwrap());
    assert!(!ctx.controller.get(&ctx.catalog.session_only).unwrap());
    assert!(!ctx.controller.can_undo().unwrap());
    assert!(ctx.storage.list_keys().await.unwrap().is_empty());
    assert_eq!(ctx.get_events().len(), 6);
}

#[tokio::test]
async fn test_export_includes_defaults_for_persisted_settings() {
    let ctx = TestContext::new().await;
    ctx.controller.set(&ctx.catalog.theme_mode, "light".to_string()).await.unwrap();
    let exported = ctx.controller.export_all().unwrap();

    assert_eq!(exported.len(), 4);
    assert_eq!(exported["theme_mode"], StoredValue::from("light"));
    assert_eq!(exported["notifications"], StoredValue::Bool(true));
    assert_eq!(exported["font_size"], StoredValue::Int(14));
    assert_eq!(exported["accent"], StoredValue::Int(0xFF33_66FF));
}

#[tokio::test]
async fn test_import_counts_only_applicable_entries() {
    let ctx = TestContext::new().await;
    let mut values = HashMap::new();
    values.insert("theme_mode".to_string(), StoredValue::from("dark"));
    values.insert("unknown_key".to_string(), StoredValue::Bool(true));
    values.insert("font_size".to_string(), StoredValue::Int(1000));
    values.insert("notifications".to_string(), StoredValue::Int(1));

    assert_eq!(ctx.controller.import_all(values).await.unwrap(), 1);
    assert_eq!(ctx.controller.get(&ctx.catalog.theme_mode).unwrap(), "dark");
    assert_eq!(ctx.controller.get(&ctx.catalog.font_size).unwrap(), 14);
}

#[tokio::test]
async fn test_json_export_import_roundtrip() {
    let source = TestContext::new().await;
    source.controller.set(&source.catalog.font_size, 18).await.unwrap();
    source.controller.set(&source.catalog.accent, Color::BLACK).await.unwrap();
    let json = source.controller.export_json().unwrap();

    let target = TestContext::new().await;
    // Entries equal to the defaults are not counted.
    assert_eq!(target.controller.import_json(&json).await.unwrap(), 2);
    assert_eq!(target.controller.get(&target.catalog.font_size).unwrap(), 18);
    assert_eq!(target.controller.get(&target.catalog.accent).unwrap(), Color::BLACK);
    assert_eq!(target.get_events().len(), 2);
    assert_eq!(target.controller.import_json(&json).await.unwrap(), 0);

    let with_junk = r#"{"font_size": 20, "theme_mode": null, "notifications": {"a": 1}}"#;
    assert_eq!(target.controller.import_json(with_junk).await.unwrap(), 1);
    assert!(matches!(
        target.controller.import_json("[1, 2]").await,
        Err(SettingsError::Serialization(_))
    ));
}

#[tokio::test]
async fn test_streams() {
    let ctx = TestContext::new().await;
    let mut deltas = ctx.controller.stream(&ctx.catalog.font_size).unwrap();
    let mut seeded = ctx.controller.stream_with_current(&ctx.catalog.font_size).unwrap();

    ctx.controller.set(&ctx.catalog.font_size, 22).await.unwrap();
    ctx.controller.set(&ctx.catalog.font_size, 24).await.unwrap();

    assert_eq!(deltas.recv().await, Some(22));
    assert_eq!(deltas.recv().await, Some(24));
    assert_eq!(seeded.recv().await, Some(14));
    assert_eq!(seeded.recv().await, Some(22));

    ctx.controller.dispose();
    assert_eq!(seeded.recv().await, Some(24));
    assert_eq!(seeded.recv().await, None);
}

#[tokio::test]
async fn test_remove_listener_stops_callbacks() {
    let ctx = TestContext::new().await;
    let hits = Arc::new(Mutex::new(0));
    let hits_clone = hits.clone();
    let id = ctx
        .controller
        .add_listener("notifications", move |_| *hits_clone.lock().unwrap() += 1)
        .unwrap();

    ctx.controller.set(&ctx.catalog.notifications, false).await.unwrap();
    assert!(ctx.controller.remove_listener(id).unwrap());
    assert!(!ctx.controller.remove_listener(id).unwrap());
    ctx.controller.set(&ctx.catalog.notifications, true).await.unwrap();
    assert_eq!(*hits.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_dependency_evaluation() {
    let ctx = TestContext::new().await;
    let sound_volume = Setting::<i64>::builder("dnd_level", 0)
        .depends_on("notifications")
        .build();
    let contrast = Setting::<i64>::builder("dark_contrast", 0)
        .depends_on("theme_mode")
        .enabled_when("dark")
        .build();

    assert!(ctx.controller.is_enabled(&sound_volume).unwrap());
    assert!(!ctx.controller.is_enabled(&contrast).unwrap());

    ctx.controller.set(&ctx.catalog.notifications, false).await.unwrap();
    ctx.controller.set(&ctx.catalog.theme_mode, "dark".to_string()).await.unwrap();
    assert!(!ctx.controller.is_enabled(&sound_volume).unwrap());
    assert!(ctx.controller.is_enabled(&contrast).unwrap());
    assert!(matches!(
        ctx.controller.value_of("nope"),
        Err(SettingsError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_dispose_makes_controller_unusable() {
    let ctx = TestContext::new().await;
    let mut changes = ctx.controller.changes().unwrap();
    ctx.controller.dispose();
    ctx.controller.dispose();

    assert!(matches!(ctx.controller.get(&ctx.catalog.font_size), Err(SettingsError::Disposed)));
    assert!(matches!(
        ctx.controller.set(&ctx.catalog.font_size, 20).await,
        Err(SettingsError::Disposed)
    ));
    assert!(matches!(ctx.controller.init().await, Err(SettingsError::Disposed)));
    assert!(matches!(ctx.controller.can_undo_stream(), Err(SettingsError::Disposed)));
    assert!(changes.recv().await.is_err());
}

#[tokio::test]
async fn test_storage_failure_on_set_leaves_state_untouched() {
    let catalog = Catalog::new();
    let mut storage = MockStorage::new();
    storage.expect_init().returning(|| Ok(()));
    storage.expect_get_string().returning(|_| ok_none());
    storage.expect_get_int().returning(|_| ok_none());
    storage.expect_get_bool().returning(|_| ok_none());
    storage
        .expect_set_int()
        .returning(|_, _| Err(StorageError::Unavailable("disk full".into())));

    let controller = SettingsController::new(catalog.registry(), Arc::new(storage), 16);
    controller.init().await.unwrap();

    assert!(!controller.set(&catalog.font_size, 20).await.unwrap());
    assert_eq!(controller.get(&catalog.font_size).unwrap(), 14);
    assert!(!controller.can_undo().unwrap());

    match controller.set_detailed(&catalog.font_size, 20, true, true).await.unwrap() {
        SetOutcome::StorageFailed(StorageError::Unavailable(msg)) => assert_eq!(msg, "disk full"),
        other => panic!("Unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_read_failure_during_init_falls_back_to_default() {
    let catalog = Catalog::new();
    let mut storage = MockStorage::new();
    storage.expect_init().returning(|| Ok(()));
    storage.expect_get_string().returning(|_| ok_none());
    storage.expect_get_bool().returning(|_| ok_none());
    storage.expect_get_int().returning(|key| {
        if key == "font_size" {
            Err(StorageError::Unavailable("locked".into()))
        } else {
            Ok(None)
        }
    });

    let controller = SettingsController::new(catalog.registry(), Arc::new(storage), 16);
    controller.init().await.unwrap();
    assert_eq!(controller.get(&catalog.font_size).unwrap(), 14);
}

#[tokio::test]
async fn test_storage_init_failure_fails_init() {
    let catalog = Catalog::new();
    let mut storage = MockStorage::new();
    storage
        .expect_init()
        .returning(|| Err(StorageError::Unavailable("no backend".into())));

    let controller = SettingsController::new(catalog.registry(), Arc::new(storage), 16);
    assert!(matches!(
        controller.init().await,
        Err(SettingsError::Storage(StorageError::Unavailable(_)))
    ));
    assert!(!controller.is_initialized());
}

#[tokio::test]
async fn test_failed_undo_write_keeps_entry() {
    let catalog = Catalog::new();
    let mut storage = MockStorage::new();
    storage.expect_init().returning(|| Ok(()));
    storage.expect_get_string().returning(|_| ok_none());
    storage.expect_get_int().returning(|_| ok_none());
    storage.expect_get_bool().returning(|_| ok_none());
    let mut calls = 0;
    storage.expect_set_int().returning(move |_, _| {
        calls += 1;
        if calls == 1 {
            Ok(())
        } else {
            Err(StorageError::Unavailable("read-only".into()))
        }
    });

    let controller = SettingsController::new(catalog.registry(), Arc::new(storage), 16);
    controller.init().await.unwrap();
    assert!(controller.set(&catalog.font_size, 20).await.unwrap());

    assert!(!controller.undo().await.unwrap());
    assert_eq!(controller.undo_depth().unwrap(), 1);
    assert!(controller.can_undo().unwrap());
    assert_eq!(controller.get(&catalog.font_size).unwrap(), 20);
}
