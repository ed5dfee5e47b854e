#![cfg(test)]
use super::definition::{Section, Setting};
use super::registry::SettingsRegistry;
use crate::error::SettingsError;
use crate::settings::types::SettingType;
use pretty_assertions::assert_eq;

fn keys(defs: &[std::sync::Arc<super::definition::SettingDefinition>]) -> Vec<&str> {
    defs.iter().map(|d| d.key()).collect()
}

fn sample_registry() -> SettingsRegistry {
    let mut registry = SettingsRegistry::new();
    registry.register(
        Setting::<String>::builder("theme_mode", "system".to_string())
            .section("appearance")
            .order(1)
            .build(),
    );
    registry.register(
        Setting::<i64>::builder("font_size", 14)
            .section("appearance")
            .sub_section("fonts")
            .order(0)
            .build(),
    );
    registry.register(
        Setting::<bool>::builder("notifications", true)
            .section("general")
            .build(),
    );
    registry
}

#[test]
fn test_get_is_type_checked() {
    let registry = sample_registry();
    assert!(registry.get::<String>("theme_mode").is_some());
    assert!(registry.get::<bool>("theme_mode").is_none());
    assert!(registry.get::<bool>("missing").is_none());
}

#[test]
fn test_require_reports_not_found_and_type_mismatch() {
    let registry = sample_registry();
    assert_eq!(registry.require::<i64>("font_size").unwrap().default_value(), 14);

    match registry.require::<bool>("missing") {
        Err(SettingsError::NotFound { key }) => assert_eq!(key, "missing"),
        other => panic!("Unexpected result: {:?}", other),
    }
    match registry.require::<bool>("font_size") {
        Err(SettingsError::TypeMismatch { key, expected, actual }) => {
            assert_eq!(key, "font_size");
            assert_eq!(expected, SettingType::Bool);
            assert_eq!(actual, SettingType::Int);
        }
        other => panic!("Unexpected result: {:?}", other),
    }
}

#[test]
fn test_settings_in_section_sorted_by_order() {
    let registry = sample_registry();
    assert_eq!(
        keys(&registry.settings_in_section("appearance")),
        vec!["font_size", "theme_mode"]
    );
    assert!(registry.settings_in_section("unknown").is_empty());
    assert_eq!(
        keys(&registry.settings_in_sub_section("appearance", "fonts")),
        vec!["font_size"]
    );
}

#[test]
fn test_section_ties_keep_registration_order() {
    let mut registry = SettingsRegistry::new();
    for key in ["c", "a", "b"] {
        registry.register(Setting::<bool>::builder(key, false).section("s").order(5).build());
    }
    assert_eq!(keys(&registry.settings_in_section("s")), vec!["c", "a", "b"]);
}

#[test]
fn test_reregistration_moves_between_sections() {
    let mut registry = sample_registry();
    let previous = registry.register(
        Setting::<bool>::builder("notifications", false)
            .section("privacy")
            .build(),
    );
    assert!(previous.is_some());
    assert_eq!(registry.len(), 3);
    assert!(registry.settings_in_section("general").is_empty());
    assert_eq!(keys(&registry.settings_in_section("privacy")), vec!["notifications"]);
    assert_eq!(registry.get::<bool>("notifications").unwrap().default_value(), false);
}

#[test]
fn test_unregister_removes_section_membership() {
    let mut registry = sample_registry();
    let removed = registry.unregister("theme_mode").unwrap();
    assert_eq!(removed.key(), "theme_mode");
    assert!(!registry.contains("theme_mode"));
    assert_eq!(keys(&registry.settings_in_section("appearance")), vec!["font_size"]);
    assert!(registry.unregister("theme_mode").is_none());
}

#[test]
fn test_definitions_in_registration_order() {
    let registry = sample_registry();
    let all: Vec<&str> = registry.definitions().map(|d| d.key()).collect();
    assert_eq!(all, vec!["theme_mode", "font_size", "notifications"]);
}

#[test]
fn test_bulk_registration_order_with_replacements() {
    let mut registry = SettingsRegistry::new();
    registry.register_all(
        (0..500).map(|i| Setting::<i64>::builder(format!("setting_{i:03}"), 0).section("bulk").build()),
    );
    registry.register(Setting::<i64>::builder("setting_000", 1).section("bulk").build());
    registry.unregister("setting_250");

    assert_eq!(registry.len(), 499);
    let all: Vec<&str> = registry.definitions().map(|d| d.key()).collect();
    assert_eq!(all.first(), Some(&"setting_001"));
    assert_eq!(all.last(), Some(&"setting_000"));
    assert!(!all.contains(&"setting_250"));

    let members = registry.settings_in_section("bulk");
    assert_eq!(members.len(), 499);
    assert_eq!(members[0].key(), "setting_001");
    assert_eq!(members[498].key(), "setting_000");
}

#[test]
fn test_sorted_and_child_sections() {
    let mut registry = SettingsRegistry::new();
    registry.register_sections([
        Section::new("general", "settings.general", 1),
        Section::new("appearance", "settings.appearance", 0),
        Section::new("fonts", "settings.fonts", 1).with_parent("appearance"),
        Section::new("colors", "settings.colors", 0).with_parent("appearance"),
    ]);
    let order: Vec<&str> = registry.sorted_sections().iter().map(|s| s.key.as_str()).collect();
    assert_eq!(order, vec!["appearance", "colors", "general", "fonts"]);

    let children: Vec<&str> = registry
        .child_sections("appearance")
        .iter()
        .map(|s| s.key.as_str())
        .collect();
    assert_eq!(children, vec!["colors", "fonts"]);

    registry.register_section(Section::new("general", "settings.general.v2", 1));
    assert_eq!(registry.sorted_sections().len(), 4);
    assert_eq!(registry.section("general").unwrap().title_key, "settings.general.v2");
}

#[test]
fn test_merge_other_wins() {
    let mut registry = sample_registry();
    let mut other = SettingsRegistry::new();
    other.register(Setting::<i64>::builder("font_size", 16).section("appearance").build());
    other.register(Setting::<bool>::builder("telemetry", false).build());
    other.register_section(Section::new("appearance", "settings.appearance", 3));

    registry.merge(other);

    assert_eq!(registry.len(), 4);
    assert_eq!(registry.get::<i64>("font_size").unwrap().default_value(), 16);
    assert!(registry.contains("telemetry"));
    assert_eq!(registry.section("appearance").unwrap().order, 3);
}
