//! Application-scoped runtime
//!
//! [`AppRuntime`] is the one object a host constructs at startup and passes
//! down to its screens. It owns the endpoint resolver, the query client and
//! the locale store; there are no module-level singletons.
//!
//! # Example
//!
//! ```no_run
//! use libappcore::locale::Locale;
//! use libappcore::runtime::AppRuntime;
//! use libappcore::Config;
//!
//! # async fn example() -> libappcore::Result<()> {
//! let config = Config::load_or_default()?;
//! let runtime = AppRuntime::from_config(&config).await?;
//!
//! if runtime.set_locale(Locale::Ar).await.is_required() {
//!     runtime.restart().await;
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, PoisonError, RwLock};

use crate::config::Config;
use crate::endpoint::EndpointResolver;
use crate::error::Result;
use crate::http::client::ReqwestTransport;
use crate::http::{HttpTransport, RequestExecutor};
use crate::locale::{LoadOutcome, Locale, LocaleStore, RestartSignal, Translations};
use crate::query::{QueryClient, QueryDefaults};
use crate::storage::{FileStorage, KeyValueStorage};

/// Shared state every screen talks to
#[derive(Clone)]
pub struct AppRuntime {
    resolver: EndpointResolver,
    queries: QueryClient,
    locale: LocaleStore,
    load_outcome: Arc<RwLock<LoadOutcome>>,
}

impl AppRuntime {
    /// Build the runtime from configuration and load the persisted locale
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The HTTP client cannot be built
    /// - No storage directory can be determined
    pub async fn from_config(config: &Config) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new()?);
        let storage = Arc::new(FileStorage::new(config.storage_dir()?));
        let resolver = EndpointResolver::from_config(&config.api);

        Ok(Self::with_parts(
            transport,
            storage,
            Arc::new(Translations::embedded()),
            resolver,
            config.query.to_defaults(),
        )
        .await)
    }

    /// Build the runtime from explicit parts and load the persisted locale
    pub async fn with_parts(
        transport: Arc<dyn HttpTransport>,
        storage: Arc<dyn KeyValueStorage>,
        translations: Arc<Translations>,
        resolver: EndpointResolver,
        defaults: QueryDefaults,
    ) -> Self {
        let queries = QueryClient::new(RequestExecutor::new(transport), resolver.clone(), defaults);
        let locale = LocaleStore::new(storage, translations);
        let load_outcome = locale.initialize().await;

        tracing::debug!(
            platform = %resolver.platform(),
            locale = %locale.locale(),
            "Runtime initialized"
        );

        Self {
            resolver,
            queries,
            locale,
            load_outcome: Arc::new(RwLock::new(load_outcome)),
        }
    }

    pub fn queries(&self) -> &QueryClient {
        &self.queries
    }

    pub fn locale(&self) -> &LocaleStore {
        &self.locale
    }

    pub fn resolver(&self) -> &EndpointResolver {
        &self.resolver
    }

    /// How the locale was obtained at the last (re)initialization
    pub fn load_outcome(&self) -> LoadOutcome {
        self.load_outcome
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Change the locale; the host restarts when the signal requires it
    pub async fn set_locale(&self, locale: Locale) -> RestartSignal {
        self.locale.set_locale(locale).await
    }

    /// Reinitialize as if the process had just started
    ///
    /// The query cache is emptied and results of requests still in flight
    /// are discarded; the locale is read back from storage.
    pub async fn restart(&self) -> LoadOutcome {
        tracing::info!("Restarting runtime");
        self.queries.reset();
        self.locale.reset();
        let outcome = self.locale.initialize().await;
        *self
            .load_outcome
            .write()
            .unwrap_or_else(PoisonError::into_inner) = outcome.clone();
        outcome
    }
}
