//! Setting catalog entries.
//!
//! A [`SettingDefinition`] is the type-erased, immutable description of one
//! setting: its key, default, display metadata, search terms and validation
//! rules. [`Setting<T>`] is the typed handle callers hold; it derefs to the
//! definition and is what the controller's `get`/`set` take.
//!
//! ```
//! use knobs_domain::settings::Setting;
//!
//! let font_size = Setting::<i64>::builder("font_size", 14)
//!     .title_key("settings.font_size.title")
//!     .section("appearance")
//!     .range(8, 72)
//!     .build();
//!
//! assert_eq!(font_size.key(), "font_size");
//! assert_eq!(font_size.default_value(), 14);
//! assert!(font_size.accepts(&20));
//! assert!(!font_size.accepts(&200));
//! ```

use knobs_core::types::Color;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use super::types::{SettingType, SettingValue, StoredValue};

/// Rust types a setting can be declared with.
pub trait SettingKind: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    const TYPE: SettingType;

    fn into_value(self) -> SettingValue;

    /// Extracts `Self` from a value of the matching variant.
    fn from_value(value: &SettingValue) -> Option<Self>;
}

impl SettingKind for String {
    const TYPE: SettingType = SettingType::String;

    fn into_value(self) -> SettingValue {
        SettingValue::String(self)
    }

    fn from_value(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl SettingKind for i64 {
    const TYPE: SettingType = SettingType::Int;

    fn into_value(self) -> SettingValue {
        SettingValue::Int(self)
    }

    fn from_value(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl SettingKind for f64 {
    const TYPE: SettingType = SettingType::Double;

    fn into_value(self) -> SettingValue {
        SettingValue::Double(self)
    }

    fn from_value(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::Double(d) => Some(*d),
            _ => None,
        }
    }
}

impl SettingKind for bool {
    const TYPE: SettingType = SettingType::Bool;

    fn into_value(self) -> SettingValue {
        SettingValue::Bool(self)
    }

    fn from_value(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl SettingKind for Vec<String> {
    const TYPE: SettingType = SettingType::StringList;

    fn into_value(self) -> SettingValue {
        SettingValue::StringList(self)
    }

    fn from_value(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::StringList(l) => Some(l.clone()),
            _ => None,
        }
    }
}

impl SettingKind for Color {
    const TYPE: SettingType = SettingType::Color;

    fn into_value(self) -> SettingValue {
        SettingValue::Color(self)
    }

    fn from_value(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::Color(c) => Some(*c),
            _ => None,
        }
    }
}

/// Built-in, type-specific validation rules.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueConstraint {
    IntRange { min: i64, max: i64 },
    DoubleRange { min: f64, max: f64 },
    /// Maximum string length in characters.
    MaxLength(usize),
    /// Allowed strings; for lists every item must be allowed.
    OneOf(Vec<String>),
    MaxItems(usize),
}

impl ValueConstraint {
    /// Constraints only restrict the variant they apply to.
    pub fn check(&self, value: &SettingValue) -> bool {
        match (self, value) {
            (ValueConstraint::IntRange { min, max }, SettingValue::Int(i)) => (*min..=*max).contains(i),
            (ValueConstraint::DoubleRange { min, max }, SettingValue::Double(d)) => {
                (*min..=*max).contains(d)
            }
            (ValueConstraint::MaxLength(max), SettingValue::String(s)) => s.chars().count() <= *max,
            (ValueConstraint::OneOf(allowed), SettingValue::String(s)) => allowed.contains(s),
            (ValueConstraint::OneOf(allowed), SettingValue::StringList(items)) => {
                items.iter().all(|item| allowed.contains(item))
            }
            (ValueConstraint::MaxItems(max), SettingValue::StringList(items)) => items.len() <= *max,
            _ => true,
        }
    }
}

type ErasedValidator = Arc<dyn Fn(&SettingValue) -> bool + Send + Sync>;

/// Type-erased description of a single setting.
pub struct SettingDefinition {
    key: String,
    setting_type: SettingType,
    default_value: SettingValue,
    title_key: String,
    subtitle_key: Option<String>,
    search_terms: BTreeMap<String, Vec<String>>,
    constraints: Vec<ValueConstraint>,
    validator: Option<ErasedValidator>,
    section: Option<String>,
    sub_section: Option<String>,
    order: i32,
    persist: bool,
    visible: bool,
    depends_on: Option<String>,
    enabled_when: Option<SettingValue>,
}

impl SettingDefinition {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn setting_type(&self) -> SettingType {
        self.setting_type
    }

    pub fn default_value(&self) -> &SettingValue {
        &self.default_value
    }

    /// Localization key of the title. Translation happens outside the core.
    pub fn title_key(&self) -> &str {
        &self.title_key
    }

    pub fn subtitle_key(&self) -> Option<&str> {
        self.subtitle_key.as_deref()
    }

    /// Locale code to ordered search terms.
    pub fn search_terms(&self) -> &BTreeMap<String, Vec<String>> {
        &self.search_terms
    }

    pub fn constraints(&self) -> &[ValueConstraint] {
        &self.constraints
    }

    pub fn section(&self) -> Option<&str> {
        self.section.as_deref()
    }

    pub fn sub_section(&self) -> Option<&str> {
        self.sub_section.as_deref()
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    /// Whether writes reach storage.
    pub fn persist(&self) -> bool {
        self.persist
    }

    /// Whether the setting is shown in UIs and search results.
    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn depends_on(&self) -> Option<&str> {
        self.depends_on.as_deref()
    }

    pub fn enabled_when(&self) -> Option<&SettingValue> {
        self.enabled_when.as_ref()
    }

    /// Checks the type rule, the built-in constraints and the custom validator.
    pub fn validate(&self, value: &SettingValue) -> bool {
        if value.setting_type() != self.setting_type {
            return false;
        }
        // JSON has no representation for NaN or infinities.
        if let SettingValue::Double(d) = value {
            if !d.is_finite() {
                return false;
            }
        }
        if !self.constraints.iter().all(|c| c.check(value)) {
            return false;
        }
        self.validator.as_ref().map_or(true, |validator| validator(value))
    }

    pub fn encode(&self, value: &SettingValue) -> Option<StoredValue> {
        self.setting_type.to_stored(value)
    }

    pub fn decode(&self, stored: &StoredValue) -> Option<SettingValue> {
        self.setting_type.from_stored(stored)
    }

    /// Evaluates this setting's dependency against the current value of the
    /// setting named by [`depends_on`](Self::depends_on).
    ///
    /// With an `enabled_when` value the two must be equal. Without one, a
    /// boolean parent enables this setting when `true`; any other parent
    /// value enables it.
    pub fn is_enabled_by(&self, parent_value: &SettingValue) -> bool {
        match (&self.enabled_when, parent_value) {
            (Some(expected), actual) => expected == actual,
            (None, SettingValue::Bool(b)) => *b,
            (None, _) => true,
        }
    }
}

impl fmt::Debug for SettingDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingDefinition")
            .field("key", &self.key)
            .field("setting_type", &self.setting_type)
            .field("default_value", &self.default_value)
            .field("section", &self.section)
            .field("order", &self.order)
            .field("persist", &self.persist)
            .field("visible", &self.visible)
            .field("has_validator", &self.validator.is_some())
            .finish_non_exhaustive()
    }
}

/// Typed handle to a [`SettingDefinition`].
pub struct Setting<T: SettingKind> {
    definition: Arc<SettingDefinition>,
    default: T,
    _marker: PhantomData<fn() -> T>,
}

impl<T: SettingKind> Setting<T> {
    pub fn builder(key: impl Into<String>, default: T) -> SettingBuilder<T> {
        SettingBuilder::new(key, default)
    }

    /// Re-types an erased definition. `None` when the type does not match.
    pub fn from_definition(definition: Arc<SettingDefinition>) -> Option<Self> {
        if definition.setting_type != T::TYPE {
            return None;
        }
        let default = T::from_value(&definition.default_value)?;
        Some(Self {
            definition,
            default,
            _marker: PhantomData,
        })
    }

    pub fn default_value(&self) -> T {
        self.default.clone()
    }

    pub fn definition(&self) -> &Arc<SettingDefinition> {
        &self.definition
    }

    /// Typed shorthand for [`SettingDefinition::validate`].
    pub fn accepts(&self, value: &T) -> bool {
        self.definition.validate(&value.clone().into_value())
    }
}

impl<T: SettingKind> Clone for Setting<T> {
    fn clone(&self) -> Self {
        Self {
            definition: Arc::clone(&self.definition),
            default: self.default.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: SettingKind> Deref for Setting<T> {
    type Target = SettingDefinition;

    fn deref(&self) -> &SettingDefinition {
        &self.definition
    }
}

impl<T: SettingKind> fmt::Debug for Setting<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Setting").field(&*self.definition).finish()
    }
}

/// Builder for [`Setting<T>`]. The title key defaults to the setting key.
pub struct SettingBuilder<T: SettingKind> {
    key: String,
    default: T,
    title_key: Option<String>,
    subtitle_key: Option<String>,
    search_terms: BTreeMap<String, Vec<String>>,
    constraints: Vec<ValueConstraint>,
    validator: Option<Arc<dyn Fn(&T) -> bool + Send + Sync>>,
    section: Option<String>,
    sub_section: Option<String>,
    order: i32,
    persist: bool,
    visible: bool,
    depends_on: Option<String>,
    enabled_when: Option<SettingValue>,
}

impl<T: SettingKind> SettingBuilder<T> {
    fn new(key: impl Into<String>, default: T) -> Self {
        Self {
            key: key.into(),
            default,
            title_key: None,
            subtitle_key: None,
            search_terms: BTreeMap::new(),
            constraints: Vec::new(),
            validator: None,
            section: None,
            sub_section: None,
            order: 0,
            persist: true,
            visible: true,
            depends_on: None,
            enabled_when: None,
        }
    }

    pub fn title_key(mut self, title_key: impl Into<String>) -> Self {
        self.title_key = Some(title_key.into());
        self
    }

    pub fn subtitle_key(mut self, subtitle_key: impl Into<String>) -> Self {
        self.subtitle_key = Some(subtitle_key.into());
        self
    }

    /// Adds search terms for `locale`, appending to any already given.
    pub fn search_terms<I, S>(mut self, locale: impl Into<String>, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_terms
            .entry(locale.into())
            .or_default()
            .extend(terms.into_iter().map(Into::into));
        self
    }

    pub fn section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn sub_section(mut self, sub_section: impl Into<String>) -> Self {
        self.sub_section = Some(sub_section.into());
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn depends_on(mut self, key: impl Into<String>) -> Self {
        self.depends_on = Some(key.into());
        self
    }

    pub fn enabled_when(mut self, value: impl Into<SettingValue>) -> Self {
        self.enabled_when = Some(value.into());
        self
    }

    /// Custom predicate, checked after the built-in constraints.
    pub fn validator(mut self, validator: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn build(self) -> Setting<T> {
        let validator = self.validator.map(|typed| {
            let erased: ErasedValidator =
                Arc::new(move |value: &SettingValue| T::from_value(value).map_or(false, |v| typed(&v)));
            erased
        });
        let title_key = self.title_key.unwrap_or_else(|| self.key.clone());
        let definition = SettingDefinition {
            key: self.key,
            setting_type: T::TYPE,
            default_value: self.default.clone().into_value(),
            title_key,
            subtitle_key: self.subtitle_key,
            search_terms: self.search_terms,
            constraints: self.constraints,
            validator,
            section: self.section,
            sub_section: self.sub_section,
            order: self.order,
            persist: self.persist,
            visible: self.visible,
            depends_on: self.depends_on,
            enabled_when: self.enabled_when,
        };
        Setting {
            definition: Arc::new(definition),
            default: self.default,
            _marker: PhantomData,
        }
    }
}

impl SettingBuilder<i64> {
    /// Inclusive range.
    pub fn range(mut self, min: i64, max: i64) -> Self {
        self.constraints.push(ValueConstraint::IntRange { min, max });
        self
    }
}

impl SettingBuilder<f64> {
    /// Inclusive range. NaN never passes.
    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.constraints.push(ValueConstraint::DoubleRange { min, max });
        self
    }
}

impl SettingBuilder<String> {
    pub fn max_length(mut self, max: usize) -> Self {
        self.constraints.push(ValueConstraint::MaxLength(max));
        self
    }

    pub fn one_of<I, S>(mut self, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraints
            .push(ValueConstraint::OneOf(allowed.into_iter().map(Into::into).collect()));
        self
    }
}

impl SettingBuilder<Vec<String>> {
    pub fn max_items(mut self, max: usize) -> Self {
        self.constraints.push(ValueConstraint::MaxItems(max));
        self
    }

    pub fn one_of<I, S>(mut self, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraints
            .push(ValueConstraint::OneOf(allowed.into_iter().map(Into::into).collect()));
        self
    }
}

/// A display group of settings. Identity is the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub key: String,
    pub title_key: String,
    pub order: i32,
    pub initially_expanded: bool,
    pub parent_key: Option<String>,
}

impl Section {
    pub fn new(key: impl Into<String>, title_key: impl Into<String>, order: i32) -> Self {
        Self {
            key: key.into(),
            title_key: title_key.into(),
            order,
            initially_expanded: true,
            parent_key: None,
        }
    }

    pub fn initially_expanded(mut self, expanded: bool) -> Self {
        self.initially_expanded = expanded;
        self
    }

    pub fn with_parent(mut self, parent_key: impl Into<String>) -> Self {
        self.parent_key = Some(parent_key.into());
        self
    }
}
