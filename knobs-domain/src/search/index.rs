//! Multi-locale inverted index over setting metadata.
//!
//! The index maps lowercase terms to the settings they describe. Terms come
//! from the setting key, its `_`-separated segments, declared search terms and,
//! when a [`LocalizationProvider`] is attached, translated titles and
//! subtitles. Queries are scored word by word against every indexed term:
//!
//! | match                   | score                   |
//! |-------------------------|-------------------------|
//! | exact                   | `10.0`                  |
//! | prefix                  | `8.0 * |word| / |term|` |
//! | substring               | `4.0 * |word| / |term|` |
//! | fuzzy (word >= 3 chars) | `2.0`                   |
//!
//! A fuzzy match needs at least 70% of the word's characters to occur in the
//! term. Scores add up across terms; with several words every word must match.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, PoisonError};
use tracing::debug;

use super::localization::LocalizationProvider;
use crate::error::SettingsError;
use crate::settings::definition::SettingDefinition;
use crate::settings::registry::SharedRegistry;

pub const EXACT_SCORE: f64 = 10.0;
pub const PREFIX_WEIGHT: f64 = 8.0;
pub const SUBSTRING_WEIGHT: f64 = 4.0;
pub const FUZZY_SCORE: f64 = 2.0;
pub const FUZZY_THRESHOLD: f64 = 0.7;
const FUZZY_MIN_WORD_LEN: usize = 3;
const MIN_TOKEN_LEN: usize = 2;

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub setting: Arc<SettingDefinition>,
    pub score: f64,
    /// The indexed term behind the best single match.
    pub matched_term: String,
    /// Locale of that term; `None` for key-derived terms.
    pub matched_locale: Option<String>,
}

pub struct SearchIndex {
    registry: SharedRegistry,
    localization: Option<Arc<dyn LocalizationProvider>>,
    /// Term to setting key to the first locale the pair was seen in.
    terms: BTreeMap<String, BTreeMap<String, Option<String>>>,
    key_terms: HashMap<String, BTreeSet<String>>,
    built: bool,
}

impl SearchIndex {
    pub fn new(registry: SharedRegistry) -> Self {
        Self {
            registry,
            localization: None,
            terms: BTreeMap::new(),
            key_terms: HashMap::new(),
            built: false,
        }
    }

    pub fn with_localization(mut self, provider: Arc<dyn LocalizationProvider>) -> Self {
        self.localization = Some(provider);
        self
    }

    /// Replaces the provider. Takes effect on the next [`rebuild`](Self::rebuild).
    pub fn set_localization(&mut self, provider: Option<Arc<dyn LocalizationProvider>>) {
        self.localization = provider;
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Indexes every registered setting, hidden ones included.
    pub fn build(&mut self) {
        self.terms.clear();
        self.key_terms.clear();

        let definitions: Vec<Arc<SettingDefinition>> = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .definitions()
            .cloned()
            .collect();

        let localization = self
            .localization
            .clone()
            .filter(|provider| provider.is_ready());
        let locales = localization
            .as_ref()
            .map(|provider| provider.supported_locales())
            .unwrap_or_default();

        for definition in &definitions {
            let key = definition.key();
            let lowered_key = key.to_lowercase();
            self.add_term(&lowered_key, key, None);
            for segment in lowered_key.split('_') {
                if segment.chars().count() >= MIN_TOKEN_LEN {
                    self.add_term(segment, key, None);
                }
            }

            for (locale, terms) in definition.search_terms() {
                for term in terms {
                    self.add_term(&term.to_lowercase(), key, Some(locale.as_str()));
                }
            }

            if let Some(provider) = &localization {
                let text_keys = std::iter::once(definition.title_key()).chain(definition.subtitle_key());
                for text_key in text_keys {
                    for locale in &locales {
                        if let Some(text) = provider.translate(text_key, locale) {
                            self.add_text(&text, key, locale);
                        }
                    }
                }
            }
        }

        self.built = true;
        debug!(
            "SearchIndex: indexed {} settings under {} terms.",
            definitions.len(),
            self.terms.len()
        );
    }

    /// Discards the index and builds it again from the current registry.
    pub fn rebuild(&mut self) {
        self.built = false;
        self.build();
    }

    fn add_text(&mut self, text: &str, key: &str, locale: &str) {
        let lowered = text.to_lowercase();
        self.add_term(&lowered, key, Some(locale));
        for token in lowered.split_whitespace() {
            if token.chars().count() >= MIN_TOKEN_LEN {
                self.add_term(token, key, Some(locale));
            }
        }
    }

    fn add_term(&mut self, term: &str, key: &str, locale: Option<&str>) {
        let term = term.trim();
        if term.is_empty() {
            return;
        }
        self.terms
            .entry(term.to_string())
            .or_default()
            .entry(key.to_string())
            .or_insert_with(|| locale.map(str::to_string));
        self.key_terms
            .entry(key.to_string())
            .or_default()
            .insert(term.to_string());
    }

    /// Setting keys indexed under `term` (case-insensitive).
    pub fn keys_for_term(&self, term: &str) -> Vec<String> {
        self.terms
            .get(&term.trim().to_lowercase())
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Every term indexed for `key`, sorted.
    pub fn terms_for_key(&self, key: &str) -> Vec<String> {
        self.key_terms
            .get(key)
            .map(|terms| terms.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Ranked visible settings matching `query`.
    ///
    /// # Errors
    ///
    /// [`SettingsError::NotBuilt`] before the first [`build`](Self::build).
    pub fn search(&self, query: &str) -> Result<Vec<SearchResult>, SettingsError> {
        if !self.built {
            return Err(SettingsError::NotBuilt);
        }
        let lowered = query.trim().to_lowercase();
        let words: Vec<&str> = lowered.split_whitespace().collect();
        if words.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: HashMap<&str, Hit<'_>> = HashMap::new();
        for (word_index, word) in words.iter().enumerate() {
            for (term, keys) in &self.terms {
                let Some(score) = score_term(word, term) else {
                    continue;
                };
                for (key, locale) in keys {
                    hits.entry(key.as_str())
                        .or_insert_with(Hit::default)
                        .record(word_index, score, term, locale.as_deref());
                }
            }
        }

        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        let mut results: Vec<SearchResult> = registry
            .definitions()
            .filter(|definition| definition.visible())
            .filter_map(|definition| {
                let hit = hits.get(definition.key())?;
                if hit.words.len() < words.len() {
                    return None;
                }
                Some(SearchResult {
                    setting: Arc::clone(definition),
                    score: hit.total,
                    matched_term: hit.best_term.to_string(),
                    matched_locale: hit.best_locale.map(str::to_string),
                })
            })
            .collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        debug!("SearchIndex: '{}' matched {} settings.", query, results.len());
        Ok(results)
    }
}

/// Per-setting accumulation while scoring one query.
#[derive(Default)]
struct Hit<'a> {
    total: f64,
    words: BTreeSet<usize>,
    best_score: f64,
    best_term: &'a str,
    best_locale: Option<&'a str>,
}

impl<'a> Hit<'a> {
    fn record(&mut self, word_index: usize, score: f64, term: &'a str, locale: Option<&'a str>) {
        self.total += score;
        self.words.insert(word_index);
        if score > self.best_score {
            self.best_score = score;
            self.best_term = term;
            self.best_locale = locale;
        }
    }
}

/// Scores one query word against one indexed term; `None` when unrelated.
pub fn score_term(word: &str, term: &str) -> Option<f64> {
    let word_len = word.chars().count();
    let term_len = term.chars().count();
    if word_len == 0 || term_len == 0 {
        return None;
    }
    let ratio = word_len as f64 / term_len as f64;

    if term == word {
        Some(EXACT_SCORE)
    } else if term.starts_with(word) {
        Some(PREFIX_WEIGHT * ratio)
    } else if term.contains(word) {
        Some(SUBSTRING_WEIGHT * ratio)
    } else if word_len >= FUZZY_MIN_WORD_LEN && fuzzy_fraction(word, term) >= FUZZY_THRESHOLD {
        Some(FUZZY_SCORE)
    } else {
        None
    }
}

/// Fraction of `word`'s characters that occur anywhere in `term`.
fn fuzzy_fraction(word: &str, term: &str) -> f64 {
    let total = word.chars().count();
    let present = word.chars().filter(|c| term.contains(*c)).count();
    present as f64 / total as f64
}
