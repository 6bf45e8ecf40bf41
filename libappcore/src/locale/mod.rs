//! Active language and layout direction
//!
//! [`LocaleStore`] holds the active [`Locale`], persists it through a
//! [`KeyValueStorage`], translates keys against the embedded tables, and
//! derives the layout direction. Reads are synchronous; the default locale
//! (`en`) is observed until [`LocaleStore::initialize`] has run.
//!
//! Switching between a left-to-right and a right-to-left locale cannot be
//! applied to an already-rendered tree, so [`LocaleStore::set_locale`]
//! returns [`RestartSignal::RestartRequired`] and leaves the restart itself
//! to the host.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use libappcore::locale::{Locale, LocaleStore, RestartSignal, Translations};
//! use libappcore::storage::FileStorage;
//!
//! # async fn example() {
//! let store = LocaleStore::new(
//!     Arc::new(FileStorage::new("/tmp/appcore")),
//!     Arc::new(Translations::embedded()),
//! );
//! store.initialize().await;
//!
//! if store.set_locale(Locale::Ar).await == RestartSignal::RestartRequired {
//!     // reload the UI
//! }
//! println!("{}", store.translate("settings"));
//! # }
//! ```

pub mod translations;

pub use translations::{TranslationTable, Translations};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use crate::storage::KeyValueStorage;

/// Storage key holding the persisted locale
pub const LOCALE_STORAGE_KEY: &str = "app_locale";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ar,
}

impl Locale {
    pub const ALL: [Locale; 2] = [Locale::En, Locale::Ar];

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Ar => "ar",
        }
    }

    /// Parse a stored value; only exactly `"en"` or `"ar"` are accepted
    pub fn parse_exact(value: &str) -> Option<Self> {
        match value {
            "en" => Some(Locale::En),
            "ar" => Some(Locale::Ar),
            _ => None,
        }
    }

    pub fn is_rtl(&self) -> bool {
        matches!(self, Locale::Ar)
    }

    pub fn direction(&self) -> Direction {
        if self.is_rtl() {
            Direction::Rtl
        } else {
            Direction::Ltr
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_exact(s)
            .ok_or_else(|| format!("Invalid locale: '{}'. Valid options: en, ar", s))
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layout direction derived from the locale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ltr,
    Rtl,
}

/// Why initialization kept the default locale
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultReason {
    /// Nothing was stored
    Missing,
    /// Storage could not be read
    Unreadable(String),
    /// A value was stored but is not a known locale
    Unrecognized(String),
}

impl fmt::Display for DefaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultReason::Missing => write!(f, "no stored locale"),
            DefaultReason::Unreadable(e) => write!(f, "storage unreadable: {}", e),
            DefaultReason::Unrecognized(v) => write!(f, "unrecognized stored locale '{}'", v),
        }
    }
}

/// Result of reading the persisted locale
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(Locale),
    Defaulted(DefaultReason),
}

impl LoadOutcome {
    /// Locale this outcome resolves to
    pub fn locale(&self) -> Locale {
        match self {
            LoadOutcome::Loaded(locale) => *locale,
            LoadOutcome::Defaulted(_) => Locale::default(),
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, LoadOutcome::Defaulted(_))
    }
}

/// Whether the host must reload to apply a locale change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartSignal {
    RestartRequired,
    NotRequired,
}

impl RestartSignal {
    pub fn is_required(&self) -> bool {
        matches!(self, RestartSignal::RestartRequired)
    }
}

#[derive(Debug, Default)]
struct LocaleState {
    locale: Locale,
    initialized: bool,
    /// Number of `set_locale` calls applied so far
    writes: u64,
}

/// Shared handle to the active locale
#[derive(Clone)]
pub struct LocaleStore {
    storage: Arc<dyn KeyValueStorage>,
    translations: Arc<Translations>,
    state: Arc<RwLock<LocaleState>>,
}

impl LocaleStore {
    /// Create a store holding the default locale; call
    /// [`initialize`](Self::initialize) to load the persisted one.
    pub fn new(storage: Arc<dyn KeyValueStorage>, translations: Arc<Translations>) -> Self {
        Self {
            storage,
            translations,
            state: Arc::new(RwLock::new(LocaleState::default())),
        }
    }

    /// Load the persisted locale
    ///
    /// Never fails: missing, unreadable, or unrecognized values keep the
    /// default, and the returned outcome says which happened. If
    /// [`set_locale`](Self::set_locale) ran while the read was pending, the
    /// newer choice is kept.
    pub async fn initialize(&self) -> LoadOutcome {
        let writes_before = self.read_state(|state| state.writes);

        let outcome = match self.storage.read(LOCALE_STORAGE_KEY).await {
            Ok(Some(value)) => match Locale::parse_exact(&value) {
                Some(locale) => LoadOutcome::Loaded(locale),
                None => LoadOutcome::Defaulted(DefaultReason::Unrecognized(value)),
            },
            Ok(None) => LoadOutcome::Defaulted(DefaultReason::Missing),
            Err(e) => LoadOutcome::Defaulted(DefaultReason::Unreadable(e.to_string())),
        };

        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if state.writes == writes_before {
                state.locale = outcome.locale();
            } else {
                tracing::debug!("Locale changed during initialization, keeping newer value");
            }
            state.initialized = true;
        }

        match &outcome {
            LoadOutcome::Loaded(locale) => tracing::debug!(locale = %locale, "Loaded stored locale"),
            LoadOutcome::Defaulted(DefaultReason::Missing) => {
                tracing::debug!("No stored locale, using default")
            }
            LoadOutcome::Defaulted(reason) => {
                tracing::warn!(reason = %reason, "Using default locale")
            }
        }

        outcome
    }

    /// Forget the loaded locale, as at process start
    ///
    /// Readers see the default locale and `is_initialized() == false` until
    /// the next [`initialize`](Self::initialize) completes. The write count
    /// survives, so a `set_locale` racing that initialization still wins.
    pub fn reset(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.locale = Locale::default();
        state.initialized = false;
    }

    pub fn is_initialized(&self) -> bool {
        self.read_state(|state| state.initialized)
    }

    /// Active locale
    pub fn locale(&self) -> Locale {
        self.read_state(|state| state.locale)
    }

    /// Persist and activate `locale`
    ///
    /// Persistence is best effort: a failed write is logged and the
    /// in-memory locale is updated anyway. Concurrent calls resolve as last
    /// write observed wins.
    ///
    /// The signal compares against the locale active when this call's
    /// update lands. With overlapping calls an earlier one may already have
    /// flipped the direction, so a later call can report `NotRequired`
    /// while a restart is still owed; hosts issuing concurrent changes
    /// should restart if any of the returned signals requires it.
    pub async fn set_locale(&self, locale: Locale) -> RestartSignal {
        if let Err(e) = self.storage.write(LOCALE_STORAGE_KEY, locale.as_str()).await {
            tracing::warn!(locale = %locale, error = %e, "Failed to persist locale");
        }

        let previous = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let previous = state.locale;
            state.locale = locale;
            state.writes += 1;
            previous
        };

        tracing::info!(from = %previous, to = %locale, "Locale changed");

        if previous.direction() != locale.direction() {
            RestartSignal::RestartRequired
        } else {
            RestartSignal::NotRequired
        }
    }

    /// Translate `key` in the active locale, or return `key` unchanged
    pub fn translate(&self, key: &str) -> String {
        self.translations.translate(self.locale(), key)
    }

    pub fn is_rtl(&self) -> bool {
        self.locale().is_rtl()
    }

    pub fn direction(&self) -> Direction {
        self.locale().direction()
    }

    pub fn translations(&self) -> &Translations {
        &self.translations
    }

    fn read_state<T>(&self, f: impl FnOnce(&LocaleState) -> T) -> T {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, StorageResult};
    use async_trait::async_trait;
    use tokio::sync::Notify;

    fn store_with(storage: &MemoryStorage) -> LocaleStore {
        LocaleStore::new(Arc::new(storage.clone()), Arc::new(Translations::embedded()))
    }

    #[test]
    fn test_parse_exact() {
        assert_eq!(Locale::parse_exact("en"), Some(Locale::En));
        assert_eq!(Locale::parse_exact("ar"), Some(Locale::Ar));
        assert_eq!(Locale::parse_exact("AR"), None);
        assert_eq!(Locale::parse_exact("en-US"), None);
        assert_eq!(Locale::parse_exact(" en"), None);
        assert_eq!(Locale::parse_exact(""), None);
        assert!("fr".parse::<Locale>().unwrap_err().contains("Invalid locale: 'fr'"));
    }

    #[test]
    fn test_direction_derived_from_locale() {
        assert!(!Locale::En.is_rtl());
        assert!(Locale::Ar.is_rtl());
        assert_eq!(Locale::En.direction(), Direction::Ltr);
        assert_eq!(Locale::Ar.direction(), Direction::Rtl);
    }

    #[test]
    fn test_default_before_initialization() {
        let store = store_with(&MemoryStorage::new().with_value(LOCALE_STORAGE_KEY, "ar"));
        assert_eq!(store.locale(), Locale::En);
        assert!(!store.is_rtl());
        assert!(!store.is_initialized());
    }

    #[tokio::test]
    async fn test_initialize_loads_stored_locale() {
        let store = store_with(&MemoryStorage::new().with_value(LOCALE_STORAGE_KEY, "ar"));
        assert_eq!(store.initialize().await, LoadOutcome::Loaded(Locale::Ar));
        assert_eq!(store.locale(), Locale::Ar);
        assert!(store.is_rtl());
        assert!(store.is_initialized());
    }

    #[tokio::test]
    async fn test_initialize_missing_value() {
        let store = store_with(&MemoryStorage::new());
        let outcome = store.initialize().await;
        assert_eq!(outcome, LoadOutcome::Defaulted(DefaultReason::Missing));
        assert_eq!(store.locale(), Locale::En);
    }

    #[tokio::test]
    async fn test_initialize_unrecognized_value() {
        let store = store_with(&MemoryStorage::new().with_value(LOCALE_STORAGE_KEY, "fr"));
        let outcome = store.initialize().await;
        assert_eq!(
            outcome,
            LoadOutcome::Defaulted(DefaultReason::Unrecognized("fr".to_string()))
        );
        assert!(outcome.is_defaulted());
        assert_eq!(store.locale(), Locale::En);
    }

    #[tokio::test]
    async fn test_initialize_unreadable_storage() {
        let storage = MemoryStorage::new().with_value(LOCALE_STORAGE_KEY, "ar");
        storage.set_fail_reads(true);
        let store = store_with(&storage);

        let outcome = store.initialize().await;
        assert!(matches!(
            outcome,
            LoadOutcome::Defaulted(DefaultReason::Unreadable(_))
        ));
        assert_eq!(store.locale(), Locale::En);
    }

    #[tokio::test]
    async fn test_set_locale_persists_and_signals_restart() {
        let storage = MemoryStorage::new();
        let store = store_with(&storage);
        store.initialize().await;

        assert_eq!(store.set_locale(Locale::Ar).await, RestartSignal::RestartRequired);
        assert_eq!(storage.get(LOCALE_STORAGE_KEY), Some("ar".to_string()));
        assert!(store.is_rtl());

        assert_eq!(store.set_locale(Locale::En).await, RestartSignal::RestartRequired);
        assert_eq!(storage.get(LOCALE_STORAGE_KEY), Some("en".to_string()));
        assert!(!store.is_rtl());
    }

    #[tokio::test]
    async fn test_same_direction_needs_no_restart() {
        let storage = MemoryStorage::new();
        let store = store_with(&storage);

        let signal = store.set_locale(Locale::En).await;
        assert_eq!(signal, RestartSignal::NotRequired);
        assert!(!signal.is_required());
        assert_eq!(storage.get(LOCALE_STORAGE_KEY), Some("en".to_string()));

        store.set_locale(Locale::Ar).await;
        assert_eq!(store.set_locale(Locale::Ar).await, RestartSignal::NotRequired);
    }

    #[tokio::test]
    async fn test_set_locale_survives_write_failure() {
        let storage = MemoryStorage::new();
        storage.set_fail_writes(true);
        let store = store_with(&storage);

        assert_eq!(store.set_locale(Locale::Ar).await, RestartSignal::RestartRequired);
        assert_eq!(store.locale(), Locale::Ar);
        assert_eq!(storage.get(LOCALE_STORAGE_KEY), None);
    }

    /// Storage whose read blocks until released
    struct GatedStorage {
        entered: Arc<Notify>,
        release: Arc<Notify>,
        value: String,
    }

    #[async_trait]
    impl KeyValueStorage for GatedStorage {
        async fn read(&self, _key: &str) -> StorageResult<Option<String>> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(Some(self.value.clone()))
        }

        async fn write(&self, _key: &str, _value: &str) -> StorageResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_set_during_initialize_is_kept() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let store = LocaleStore::new(
            Arc::new(GatedStorage {
                entered: entered.clone(),
                release: release.clone(),
                value: "en".to_string(),
            }),
            Arc::new(Translations::embedded()),
        );

        let init = {
            let store = store.clone();
            tokio::spawn(async move { store.initialize().await })
        };

        entered.notified().await;
        store.set_locale(Locale::Ar).await;
        release.notify_one();

        let outcome = init.await.unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded(Locale::En));
        assert_eq!(store.locale(), Locale::Ar);
        assert!(store.is_initialized());
    }

    #[tokio::test]
    async fn test_reset_returns_to_cold_state() {
        let storage = MemoryStorage::new().with_value(LOCALE_STORAGE_KEY, "ar");
        let store = store_with(&storage);
        store.initialize().await;
        assert_eq!(store.locale(), Locale::Ar);

        store.reset();
        assert_eq!(store.locale(), Locale::En);
        assert!(!store.is_initialized());
        assert!(!store.is_rtl());

        assert_eq!(store.initialize().await, LoadOutcome::Loaded(Locale::Ar));
        assert!(store.is_initialized());
    }

    #[tokio::test]
    async fn test_concurrent_sets_signal_restart_once() {
        let store = store_with(&MemoryStorage::new());

        let (first, second) = tokio::join!(store.set_locale(Locale::Ar), store.set_locale(Locale::Ar));
        assert_eq!(first, RestartSignal::RestartRequired);
        assert_eq!(second, RestartSignal::NotRequired);
        assert!(first.is_required() || second.is_required());
        assert!(store.is_rtl());
    }

    #[tokio::test]
    async fn test_translate_active_locale() {
        let store = store_with(&MemoryStorage::new());
        assert_eq!(store.translate("sign_in"), "Sign in");
        store.set_locale(Locale::Ar).await;
        assert_eq!(store.translate("sign_in"), "تسجيل الدخول");
    }

    #[tokio::test]
    async fn test_translate_missing_key_returns_key() {
        let store = store_with(&MemoryStorage::new());
        assert_eq!(store.translate("nonexistent_key"), "nonexistent_key");
        store.set_locale(Locale::Ar).await;
        assert_eq!(store.translate("nonexistent_key"), "nonexistent_key");
    }
}
