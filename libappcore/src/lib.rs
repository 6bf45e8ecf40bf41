//! Appcore - shared runtime for the mobile and web app
//!
//! This library holds the parts of the app with real state: the request and
//! cache layer every screen uses to reach the backend, and the locale store
//! that drives translated text and layout direction.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod locale;
pub mod logging;
pub mod query;
pub mod runtime;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use endpoint::{Endpoint, EndpointResolver, Platform, Scheme};
pub use error::{AppCoreError, RequestError, Result};
pub use locale::{Locale, LocaleStore, RestartSignal};
pub use query::{QueryClient, QueryKey, UnauthorizedBehavior};
pub use runtime::AppRuntime;
