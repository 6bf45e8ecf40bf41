//! API origin resolution
//!
//! Computes the scheme and host every request is issued against. The host
//! comes from the `APPCORE_API_HOST` environment variable when set, then
//! from configuration, and finally from a per-platform default. Resolution
//! happens on every call; nothing is cached across the process.
//!
//! # Examples
//!
//! ```
//! use libappcore::endpoint::{resolve_origin_with, Platform, Scheme};
//!
//! let endpoint = resolve_origin_with(None, Platform::Android, "10.0.2.2:5001", "localhost:5001");
//! assert_eq!(endpoint.scheme, Scheme::Http);
//! assert_eq!(endpoint.origin(), "http://10.0.2.2:5001");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::ApiConfig;

/// Environment variable supplying the API host
pub const API_HOST_ENV: &str = "APPCORE_API_HOST";

/// Host reachable from an Android emulator (loopback alias of the dev machine)
pub const ANDROID_DEFAULT_HOST: &str = "10.0.2.2:5001";

/// Host used on every other platform
pub const DEFAULT_HOST: &str = "localhost:5001";

const LOOPBACK_MARKERS: [&str; 2] = ["localhost", "10.0.2.2"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
    Web,
    Desktop,
}

impl Platform {
    /// Platform of the current build target
    pub fn current() -> Self {
        if cfg!(target_os = "android") {
            Platform::Android
        } else if cfg!(target_os = "ios") {
            Platform::Ios
        } else if cfg!(target_family = "wasm") {
            Platform::Web
        } else {
            Platform::Desktop
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
            Platform::Web => "web",
            Platform::Desktop => "desktop",
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            "web" => Ok(Platform::Web),
            "desktop" => Ok(Platform::Desktop),
            _ => Err(format!(
                "Invalid platform: '{}'. Valid options: android, ios, web, desktop",
                s
            )),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved scheme + host pair all requests are built on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub scheme: Scheme,
    pub host: String,
}

impl Endpoint {
    /// Build an endpoint for `host`, choosing the scheme from the host
    pub fn for_host(host: impl Into<String>) -> Self {
        let host = host.into();
        Self {
            scheme: scheme_for_host(&host),
            host,
        }
    }

    /// `"<scheme>://<host>"`
    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }

    /// Join `path` onto this origin
    ///
    /// Absolute URLs are returned unchanged and relative paths gain a
    /// leading `/`, so applying this to its own output is a no-op.
    pub fn url(&self, path: &str) -> String {
        if is_absolute_url(path) {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.origin(), path)
        } else {
            format!("{}/{}", self.origin(), path)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)
    }
}

/// Plain HTTP for loopback development hosts, HTTPS for everything else
pub fn scheme_for_host(host: &str) -> Scheme {
    if LOOPBACK_MARKERS.iter().any(|marker| host.contains(marker)) {
        Scheme::Http
    } else {
        Scheme::Https
    }
}

/// Whether `url` already carries an `http://` or `https://` scheme
pub fn is_absolute_url(url: &str) -> bool {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Pure origin resolution from an optional host override and a platform
pub fn resolve_origin_with(
    host_override: Option<&str>,
    platform: Platform,
    android_host: &str,
    default_host: &str,
) -> Endpoint {
    let host = match host_override {
        Some(host) => host,
        None if platform == Platform::Android => android_host,
        None => default_host,
    };
    Endpoint::for_host(host)
}

/// Resolves the API origin from environment, configuration and platform
#[derive(Debug, Clone)]
pub struct EndpointResolver {
    platform: Platform,
    configured_host: Option<String>,
    android_host: String,
    default_host: String,
    env_var: String,
}

impl EndpointResolver {
    /// Resolver for `platform` with the built-in default hosts
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            configured_host: None,
            android_host: ANDROID_DEFAULT_HOST.to_string(),
            default_host: DEFAULT_HOST.to_string(),
            env_var: API_HOST_ENV.to_string(),
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self {
            platform: config.platform.unwrap_or_else(Platform::current),
            configured_host: config.host.clone(),
            android_host: config.android_host.clone(),
            default_host: config.default_host.clone(),
            env_var: API_HOST_ENV.to_string(),
        }
    }

    /// Use a fixed host, ignoring platform defaults (environment still wins)
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.configured_host = Some(host.into());
        self
    }

    /// Read the override from a different environment variable
    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var = name.into();
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Resolve the current origin
    ///
    /// The environment is consulted on every call. An empty variable counts
    /// as unset.
    pub fn resolve_origin(&self) -> Endpoint {
        let env_host = std::env::var(&self.env_var)
            .ok()
            .filter(|value| !value.trim().is_empty());
        let host_override = env_host.as_deref().or(self.configured_host.as_deref());

        resolve_origin_with(
            host_override,
            self.platform,
            &self.android_host,
            &self.default_host,
        )
    }

    /// Full URL for `path` against the current origin
    pub fn build_resource_url(&self, path: &str) -> String {
        if is_absolute_url(path) {
            return path.to_string();
        }
        self.resolve_origin().url(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn resolver(platform: Platform) -> EndpointResolver {
        // Isolated from APPCORE_API_HOST so tests can run in parallel
        EndpointResolver::new(platform).with_env_var("APPCORE_TEST_UNSET_HOST")
    }

    #[test]
    fn test_loopback_hosts_use_http() {
        for host in [
            "localhost",
            "localhost:5001",
            "api.localhost:8080",
            "10.0.2.2",
            "10.0.2.2:5001",
        ] {
            assert_eq!(scheme_for_host(host), Scheme::Http, "host {}", host);
        }
    }

    #[test]
    fn test_other_hosts_use_https() {
        for host in ["api.example.com", "127.0.0.1:5001", "10.0.2.3", "example.org:443", ""] {
            assert_eq!(scheme_for_host(host), Scheme::Https, "host {}", host);
        }
    }

    #[test]
    fn test_android_default_origin() {
        let endpoint = resolver(Platform::Android).resolve_origin();
        assert_eq!(
            endpoint,
            Endpoint {
                scheme: Scheme::Http,
                host: "10.0.2.2:5001".to_string()
            }
        );
    }

    #[test]
    fn test_non_android_default_origin() {
        for platform in [Platform::Ios, Platform::Web, Platform::Desktop] {
            let endpoint = resolver(platform).resolve_origin();
            assert_eq!(endpoint.host, "localhost:5001");
            assert_eq!(endpoint.scheme, Scheme::Http);
        }
    }

    #[test]
    fn test_override_used_verbatim() {
        let endpoint = resolve_origin_with(
            Some("api.example.com"),
            Platform::Android,
            ANDROID_DEFAULT_HOST,
            DEFAULT_HOST,
        );
        assert_eq!(
            endpoint,
            Endpoint {
                scheme: Scheme::Https,
                host: "api.example.com".to_string()
            }
        );
    }

    #[test]
    fn test_configured_host_beats_platform_default() {
        let endpoint = resolver(Platform::Android)
            .with_host("api.example.com")
            .resolve_origin();
        assert_eq!(endpoint.origin(), "https://api.example.com");
    }

    #[test]
    #[serial]
    fn test_environment_override_read_per_call() {
        let resolver = EndpointResolver::new(Platform::Desktop).with_env_var("APPCORE_TEST_API_HOST");

        std::env::remove_var("APPCORE_TEST_API_HOST");
        assert_eq!(resolver.resolve_origin().host, "localhost:5001");

        std::env::set_var("APPCORE_TEST_API_HOST", "api.example.com");
        assert_eq!(resolver.resolve_origin().origin(), "https://api.example.com");

        std::env::set_var("APPCORE_TEST_API_HOST", "");
        assert_eq!(resolver.resolve_origin().host, "localhost:5001");

        std::env::remove_var("APPCORE_TEST_API_HOST");
    }

    #[test]
    fn test_build_resource_url_adds_leading_slash() {
        let resolver = resolver(Platform::Desktop);
        assert_eq!(
            resolver.build_resource_url("api/user"),
            "http://localhost:5001/api/user"
        );
        assert_eq!(
            resolver.build_resource_url("/api/user"),
            "http://localhost:5001/api/user"
        );
    }

    #[test]
    fn test_build_resource_url_is_idempotent() {
        let resolver = resolver(Platform::Android);
        for path in ["api/items", "/api/items", "https://cdn.example.com/a.png", "HTTP://x/y"] {
            let once = resolver.build_resource_url(path);
            let twice = resolver.build_resource_url(&once);
            assert_eq!(once, twice, "path {}", path);
        }
        assert_eq!(
            resolver.build_resource_url("https://cdn.example.com/a.png"),
            "https://cdn.example.com/a.png"
        );
    }

    #[test]
    fn test_is_absolute_url() {
        assert!(is_absolute_url("http://localhost"));
        assert!(is_absolute_url("HTTPS://example.com"));
        assert!(!is_absolute_url("/api"));
        assert!(!is_absolute_url("ftp://example.com"));
        assert!(!is_absolute_url("http"));
    }

    #[test]
    fn test_platform_from_str() {
        assert_eq!("android".parse::<Platform>().unwrap(), Platform::Android);
        assert_eq!("IOS".parse::<Platform>().unwrap(), Platform::Ios);
        assert_eq!("Web".parse::<Platform>().unwrap(), Platform::Web);
        assert_eq!("desktop".parse::<Platform>().unwrap(), Platform::Desktop);
        let err = "amiga".parse::<Platform>().unwrap_err();
        assert!(err.contains("Invalid platform: 'amiga'"));
    }

    #[test]
    fn test_endpoint_display() {
        let endpoint = Endpoint::for_host("api.example.com");
        assert_eq!(endpoint.to_string(), "https://api.example.com");
    }

    #[test]
    fn test_from_config_platform_override() {
        let config = ApiConfig {
            platform: Some(Platform::Android),
            ..ApiConfig::default()
        };
        let resolver = EndpointResolver::from_config(&config).with_env_var("APPCORE_TEST_UNSET_HOST");
        assert_eq!(resolver.platform(), Platform::Android);
        assert_eq!(resolver.resolve_origin().origin(), "http://10.0.2.2:5001");
    }
}
