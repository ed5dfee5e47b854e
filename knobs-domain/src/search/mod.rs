//! Setting search.

pub mod index;
pub mod localization;

pub use index::{score_term, SearchIndex, SearchResult};
pub use localization::{LocalizationProvider, StaticLocalizationProvider};
