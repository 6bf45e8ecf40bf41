//! Translation tables
//!
//! One flat key -> string table per locale, embedded at build time from
//! `assets/i18n/<locale>.json`.

use rust_embed::RustEmbed;
use std::collections::HashMap;

use super::Locale;

#[derive(RustEmbed)]
#[folder = "assets/i18n/"]
struct Asset;

pub type TranslationTable = HashMap<String, String>;

/// Immutable translation tables for every supported locale
#[derive(Debug, Clone)]
pub struct Translations {
    tables: HashMap<Locale, TranslationTable>,
}

impl Default for Translations {
    fn default() -> Self {
        Self::embedded()
    }
}

impl Translations {
    /// Load the tables embedded in the binary
    ///
    /// A missing or malformed table is logged and left empty, so lookups
    /// for that locale fall back to the key.
    pub fn embedded() -> Self {
        let tables = Locale::ALL
            .iter()
            .map(|locale| (*locale, load_embedded(*locale)))
            .collect();
        Self { tables }
    }

    /// Build from explicit tables; locales not present get an empty table
    pub fn from_tables(mut tables: HashMap<Locale, TranslationTable>) -> Self {
        for locale in Locale::ALL {
            tables.entry(locale).or_default();
        }
        Self { tables }
    }

    pub fn table(&self, locale: Locale) -> Option<&TranslationTable> {
        self.tables.get(&locale)
    }

    /// Exact lookup without fallback
    pub fn lookup(&self, locale: Locale, key: &str) -> Option<&str> {
        self.tables
            .get(&locale)
            .and_then(|table| table.get(key))
            .map(String::as_str)
    }

    /// Lookup falling back to `key` itself
    pub fn translate(&self, locale: Locale, key: &str) -> String {
        self.lookup(locale, key).unwrap_or(key).to_string()
    }
}

fn load_embedded(locale: Locale) -> TranslationTable {
    let filename = format!("{}.json", locale.as_str());
    let Some(file) = Asset::get(&filename) else {
        tracing::warn!(locale = %locale, "No embedded translation table");
        return TranslationTable::new();
    };

    match serde_json::from_slice::<TranslationTable>(file.data.as_ref()) {
        Ok(table) => table,
        Err(e) => {
            tracing::warn!(locale = %locale, error = %e, "Malformed translation table");
            TranslationTable::new()
        }
    }
}
