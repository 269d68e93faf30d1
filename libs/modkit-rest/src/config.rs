use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::time::Duration;

/// Default User-Agent string for REST requests
pub const DEFAULT_USER_AGENT: &str = concat!("modkit-rest/", env!("CARGO_PKG_VERSION"));

/// Logical name used for transport reuse when the caller does not set one
pub const DEFAULT_CLIENT_NAME: &str = "default";

/// Default maximum response body size (10 MB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Status codes treated as success unless configured otherwise
pub const DEFAULT_SUCCESS_RANGE: RangeInclusive<u16> = 200..=299;

/// TLS root certificate configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Use Mozilla's root certificates (webpki-roots, no OS dependency)
    #[default]
    WebPki,
    /// Use OS native root certificate store
    Native,
}

/// Transport security configuration
///
/// Controls whether the client enforces TLS or allows insecure HTTP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TransportSecurity {
    /// Require TLS for all connections (HTTPS only) - default and recommended
    #[default]
    TlsOnly,
    /// Allow insecure HTTP connections (for testing with mock servers only)
    ///
    /// **WARNING**: Never use in production as it exposes traffic to interception.
    AllowInsecureHttp,
}

/// Single default header entry.
///
/// Headers are kept as an ordered list so the same name may appear more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderEntry {
    pub name: String,
    pub value: String,
}

impl HeaderEntry {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Redirect handling for the default transport.
///
/// The default follows up to 10 same-origin redirects, never follows an
/// HTTPS to HTTP downgrade and removes `Authorization`, `Cookie` and
/// `Proxy-Authorization` whenever a hop leaves the original origin.
///
/// ```ignore
/// let redirect = RedirectConfig {
///     allowed_redirect_hosts: HashSet::from(["cdn.example.com".to_owned()]),
///     ..RedirectConfig::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RedirectConfig {
    /// Maximum number of redirects to follow; `0` returns 3xx as-is (default: 10)
    pub max_redirects: usize,

    /// Stop at redirects leaving the original origin unless the target host
    /// is listed in `allowed_redirect_hosts` (default: true)
    pub same_origin_only: bool,

    /// Host names (no scheme or port) reachable even when `same_origin_only` is set
    pub allowed_redirect_hosts: HashSet<String>,

    /// Drop credential headers on cross-origin hops (default: true)
    pub strip_sensitive_headers: bool,

    /// Follow `https` to `http` redirects (default: false)
    pub allow_https_downgrade: bool,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            max_redirects: 10,
            same_origin_only: true,
            allowed_redirect_hosts: HashSet::new(),
            strip_sensitive_headers: true,
            allow_https_downgrade: false,
        }
    }
}

impl RedirectConfig {
    /// Follow redirects to any host over TLS, still stripping credentials
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            same_origin_only: false,
            ..Self::default()
        }
    }

    /// Never follow redirects
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_redirects: 0,
            ..Self::default()
        }
    }

    /// Permissive redirects that may also cross from `https` to `http`.
    ///
    /// Credentials are still stripped on cross-origin hops. Meant for local
    /// mock servers only.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            allow_https_downgrade: true,
            ..Self::permissive()
        }
    }
}

/// Settings applied when the transport for a logical client name is created.
///
/// Transports are cached by name, so changing these settings only affects
/// transports created afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    /// Per-request timeout (default: 30 seconds)
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// User-Agent header value, added when the request has none
    pub user_agent: String,

    /// Transport security mode (default: `TlsOnly`)
    pub security: TransportSecurity,

    /// TLS root certificate strategy (default: `WebPki`)
    pub tls_roots: TlsRootConfig,

    /// Let the transport decode gzip/br/deflate bodies itself (default: false)
    ///
    /// When enabled the transport advertises `Accept-Encoding` and strips
    /// `Content-Encoding` after decoding, so a client-side compressor never
    /// sees an encoded payload.
    pub auto_decompress: bool,

    /// Redirect policy (default: same-origin only, 10 hops)
    pub redirect: RedirectConfig,

    /// Timeout for idle pooled connections (default: 90 seconds)
    #[serde(with = "humantime_serde::option")]
    pub pool_idle_timeout: Option<Duration>,

    /// Maximum number of idle connections per host (default: 32)
    pub pool_max_idle_per_host: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            security: TransportSecurity::TlsOnly,
            tls_roots: TlsRootConfig::default(),
            auto_decompress: false,
            redirect: RedirectConfig::default(),
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
        }
    }
}

/// Overall REST client configuration
///
/// Collaborators that are behavior rather than data (serializer, compressor,
/// tracer, request converter, transport factory) are injected through
/// [`RestClientBuilder`](crate::RestClientBuilder).
///
/// # Example
///
/// ```ignore
/// let config: RestClientConfig = serde_json::from_str(r#"{
///     "name": "billing",
///     "base_uri": "https://billing.example.com/api/v2/",
///     "default_headers": [{ "name": "accept", "value": "application/json" }],
///     "transport": { "timeout": "10s" }
/// }"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RestClientConfig {
    /// Logical name, also the key under which the transport is cached
    pub name: String,

    /// Base URI; relative request URIs are resolved against it
    pub base_uri: Option<String>,

    /// Headers sent with every request unless the request overrides them
    pub default_headers: Vec<HeaderEntry>,

    /// Return an error for non-success statuses (default: true)
    pub throw_on_failure: bool,

    /// Status codes considered successful (default: 200..=299)
    pub success_range: RangeInclusive<u16>,

    /// Maximum response body size in bytes, applied before decompression (default: 10 MB)
    pub max_body_size: usize,

    /// Settings for the underlying transport
    pub transport: TransportConfig,
}

impl Default for RestClientConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_CLIENT_NAME.to_owned(),
            base_uri: None,
            default_headers: Vec::new(),
            throw_on_failure: true,
            success_range: DEFAULT_SUCCESS_RANGE,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            transport: TransportConfig::default(),
        }
    }
}

impl RestClientConfig {
    /// Create minimal configuration (small timeout, 1 MB bodies, no redirects)
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            max_body_size: 1024 * 1024,
            transport: TransportConfig {
                timeout: Duration::from_secs(10),
                redirect: RedirectConfig::disabled(),
                pool_idle_timeout: Some(Duration::from_secs(30)),
                pool_max_idle_per_host: 8,
                ..TransportConfig::default()
            },
            ..Self::default()
        }
    }

    /// Create configuration for testing with mock servers (allows insecure HTTP)
    ///
    /// **WARNING**: This configuration allows plain HTTP connections.
    /// Use only for local testing with mock servers, never in production.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            max_body_size: 1024 * 1024,
            transport: TransportConfig {
                timeout: Duration::from_secs(10),
                security: TransportSecurity::AllowInsecureHttp,
                redirect: RedirectConfig::for_testing(),
                pool_idle_timeout: Some(Duration::from_secs(10)),
                pool_max_idle_per_host: 4,
                ..TransportConfig::default()
            },
            ..Self::default()
        }
    }

    /// Whether `status` falls into the configured success range
    #[must_use]
    pub fn is_success(&self, status: http::StatusCode) -> bool {
        self.success_range.contains(&status.as_u16())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RestClientConfig::default();
        assert_eq!(config.name, DEFAULT_CLIENT_NAME);
        assert!(config.base_uri.is_none());
        assert!(config.throw_on_failure);
        assert_eq!(config.success_range, 200..=299);
        assert_eq!(config.max_body_size, DEFAULT_MAX_BODY_SIZE);
        assert_eq!(config.transport.timeout, Duration::from_secs(30));
        assert_eq!(config.transport.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.transport.security, TransportSecurity::TlsOnly);
        assert!(!config.transport.auto_decompress);
    }

    #[test]
    fn test_for_testing_allows_insecure_http() {
        let config = RestClientConfig::for_testing();
        assert_eq!(
            config.transport.security,
            TransportSecurity::AllowInsecureHttp
        );
    }

    #[test]
    fn test_redirect_config_presets() {
        let default = RedirectConfig::default();
        assert_eq!(default.max_redirects, 10);
        assert!(default.same_origin_only);
        assert!(default.strip_sensitive_headers);
        assert!(!default.allow_https_downgrade);

        let permissive = RedirectConfig::permissive();
        assert!(!permissive.same_origin_only);
        assert!(permissive.strip_sensitive_headers);
        assert!(!permissive.allow_https_downgrade);

        let testing = RestClientConfig::for_testing().transport.redirect;
        assert!(!testing.same_origin_only);
        assert!(testing.strip_sensitive_headers);
        assert!(testing.allow_https_downgrade);
    }

    #[test]
    fn test_deserialize_redirect_allow_list() {
        let json = r#"{ "redirect": { "allowed_redirect_hosts": ["cdn.example.com"] } }"#;
        let transport: TransportConfig = serde_json::from_str(json).unwrap();
        assert!(transport.redirect.same_origin_only);
        assert!(
            transport
                .redirect
                .allowed_redirect_hosts
                .contains("cdn.example.com")
        );
    }

    #[test]
    fn test_minimal_disables_redirects() {
        let config = RestClientConfig::minimal();
        assert_eq!(config.transport.redirect.max_redirects, 0);
        assert_eq!(config.transport.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_is_success_uses_range() {
        let mut config = RestClientConfig::default();
        assert!(config.is_success(http::StatusCode::OK));
        assert!(config.is_success(http::StatusCode::NO_CONTENT));
        assert!(!config.is_success(http::StatusCode::NOT_MODIFIED));

        config.success_range = 200..=304;
        assert!(config.is_success(http::StatusCode::NOT_MODIFIED));
        assert!(!config.is_success(http::StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_deserialize_partial_config_uses_defaults() {
        let json = r#"{
            "name": "billing",
            "base_uri": "https://billing.example.com/api/",
            "default_headers": [
                { "name": "accept", "value": "application/json" },
                { "name": "x-tenant", "value": "a" },
                { "name": "x-tenant", "value": "b" }
            ],
            "transport": { "timeout": "1m 30s", "pool_idle_timeout": null }
        }"#;

        let config: RestClientConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.name, "billing");
        assert_eq!(config.default_headers.len(), 3);
        assert_eq!(config.default_headers[2], HeaderEntry::new("x-tenant", "b"));
        assert_eq!(config.transport.timeout, Duration::from_secs(90));
        assert_eq!(config.transport.pool_idle_timeout, None);
        assert_eq!(config.transport.redirect, RedirectConfig::default());
        assert!(config.throw_on_failure);
    }

    #[test]
    fn test_deserialize_rejects_unknown_fields() {
        let json = r#"{ "retries": 3 }"#;
        let result: Result<RestClientConfig, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = RestClientConfig::for_testing();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"10s\""));
        let back: RestClientConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
