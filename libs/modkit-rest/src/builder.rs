use crate::client::RestClient;
use crate::compression::Compressor;
use crate::config::{
    HeaderEntry, RedirectConfig, RestClientConfig, TlsRootConfig, TransportSecurity,
};
use crate::converter::{DefaultRequestConverter, RequestConverter, parse_base_uri};
use crate::error::RestError;
use crate::serialization::{JsonAdapter, SerializationAdapter};
use crate::trace::{LogTracer, Tracer};
use crate::transport::{
    CachingTransportFactory, SingletonTransportFactory, Transport, TransportFactory,
};
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`RestClient`]
///
/// Data settings live in [`RestClientConfig`]; collaborators are set with
/// dedicated methods. Anything left unset falls back to the defaults:
/// a fresh [`CachingTransportFactory`], [`DefaultRequestConverter`], no
/// compressor and no tracer.
pub struct RestClientBuilder<A = JsonAdapter> {
    config: RestClientConfig,
    adapter: A,
    compressor: Option<Arc<dyn Compressor>>,
    tracer: Option<Arc<dyn Tracer>>,
    converter: Option<Arc<dyn RequestConverter>>,
    factory: Option<Arc<dyn TransportFactory>>,
}

impl RestClientBuilder<JsonAdapter> {
    /// Create a JSON client builder with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_adapter(JsonAdapter)
    }

    /// Create a JSON client builder from an existing configuration
    #[must_use]
    pub fn with_config(config: RestClientConfig) -> Self {
        Self::new().config(config)
    }
}

impl Default for RestClientBuilder<JsonAdapter> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: SerializationAdapter> RestClientBuilder<A> {
    /// Create a builder using `adapter` for request and response bodies
    #[must_use]
    pub fn with_adapter(adapter: A) -> Self {
        Self {
            config: RestClientConfig::default(),
            adapter,
            compressor: None,
            tracer: None,
            converter: None,
            factory: None,
        }
    }

    /// Swap the serialization adapter
    #[must_use]
    pub fn adapter<B: SerializationAdapter>(self, adapter: B) -> RestClientBuilder<B> {
        RestClientBuilder {
            config: self.config,
            adapter,
            compressor: self.compressor,
            tracer: self.tracer,
            converter: self.converter,
            factory: self.factory,
        }
    }

    /// Replace the whole data configuration
    #[must_use]
    pub fn config(mut self, config: RestClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Logical client name; clients with the same name share a cached transport
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Base URI that relative request URIs are resolved against
    #[must_use]
    pub fn base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.config.base_uri = Some(base_uri.into());
        self
    }

    /// Add a header sent with every request (repeat for multiple values)
    #[must_use]
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config
            .default_headers
            .push(HeaderEntry::new(name, value));
        self
    }

    /// Fail calls whose status is outside the success range (default: true)
    #[must_use]
    pub fn throw_on_failure(mut self, enabled: bool) -> Self {
        self.config.throw_on_failure = enabled;
        self
    }

    /// Status codes treated as success (default: `200..=299`)
    #[must_use]
    pub fn success_range(mut self, range: RangeInclusive<u16>) -> Self {
        self.config.success_range = range;
        self
    }

    /// Set the per-request timeout enforced by the transport
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.transport.timeout = timeout;
        self
    }

    /// Set the User-Agent header value
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.transport.user_agent = user_agent.into();
        self
    }

    /// Set maximum response body size, checked before decompression
    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Set transport security mode
    ///
    /// Use `TransportSecurity::AllowInsecureHttp` only for testing with mock servers.
    #[must_use]
    pub fn transport_security(mut self, security: TransportSecurity) -> Self {
        self.config.transport.security = security;
        self
    }

    /// Allow insecure HTTP connections (for testing only)
    ///
    /// Only available in debug builds or with the `allow-insecure-http` feature.
    #[must_use]
    #[cfg(any(debug_assertions, feature = "allow-insecure-http"))]
    pub fn allow_insecure_http(mut self) -> Self {
        tracing::warn!(
            target: "modkit_rest::security",
            "allow_insecure_http() called - HTTP traffic will NOT be encrypted"
        );
        self.config.transport.security = TransportSecurity::AllowInsecureHttp;
        self
    }

    /// Choose the TLS root certificate source
    #[must_use]
    pub fn tls_roots(mut self, roots: TlsRootConfig) -> Self {
        self.config.transport.tls_roots = roots;
        self
    }

    /// Let the default transport decode gzip/br/deflate bodies itself
    #[must_use]
    pub fn auto_decompress(mut self, enabled: bool) -> Self {
        self.config.transport.auto_decompress = enabled;
        self
    }

    /// Maximum number of redirects the default transport follows
    #[must_use]
    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.config.transport.redirect.max_redirects = max_redirects;
        self
    }

    /// Replace the redirect policy (same-origin only by default)
    #[must_use]
    pub fn redirect(mut self, redirect: RedirectConfig) -> Self {
        self.config.transport.redirect = redirect;
        self
    }

    /// Return 3xx responses as-is
    #[must_use]
    pub fn no_redirects(self) -> Self {
        self.max_redirects(0)
    }

    /// Set idle timeout for pooled connections (`None` keeps them indefinitely)
    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.transport.pool_idle_timeout = timeout;
        self
    }

    /// Set maximum idle connections per host
    #[must_use]
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.transport.pool_max_idle_per_host = max;
        self
    }

    /// Decompress payloads whose `Content-Encoding` matches `compressor`
    #[must_use]
    pub fn compressor(mut self, compressor: impl Compressor + 'static) -> Self {
        self.compressor = Some(Arc::new(compressor));
        self
    }

    /// Send request and response events to `tracer`
    #[must_use]
    pub fn tracer(mut self, tracer: impl Tracer + 'static) -> Self {
        self.tracer = Some(Arc::new(tracer));
        self
    }

    /// Trace through `tracing` with [`LogTracer`]
    #[must_use]
    pub fn log_tracing(self) -> Self {
        self.tracer(LogTracer::new())
    }

    /// Replace the request converter
    #[must_use]
    pub fn request_converter(mut self, converter: impl RequestConverter + 'static) -> Self {
        self.converter = Some(Arc::new(converter));
        self
    }

    /// Use `factory` to obtain transports (share one factory to share transports)
    #[must_use]
    pub fn transport_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Use one pre-built transport for every call
    #[must_use]
    pub fn transport(self, transport: Transport) -> Self {
        self.transport_factory(Arc::new(SingletonTransportFactory::new(transport)))
    }

    /// Build the client
    ///
    /// Validates the base URI, default headers and User-Agent, and obtains the
    /// transport once so TLS problems surface here rather than on the first call.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the transport cannot be created.
    pub fn build(self) -> Result<RestClient<A>, RestError> {
        let base_uri = self
            .config
            .base_uri
            .as_deref()
            .map(parse_base_uri)
            .transpose()?;
        let default_headers = header_map(&self.config.default_headers)?;
        HeaderValue::from_str(&self.config.transport.user_agent)?;

        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(CachingTransportFactory::new()));
        factory.transport(&self.config.name, &self.config.transport)?;

        Ok(RestClient {
            config: self.config,
            base_uri,
            default_headers,
            adapter: self.adapter,
            compressor: self.compressor,
            tracer: self.tracer,
            converter: self
                .converter
                .unwrap_or_else(|| Arc::new(DefaultRequestConverter)),
            factory,
        })
    }
}

fn header_map(entries: &[HeaderEntry]) -> Result<HeaderMap, RestError> {
    let mut headers = HeaderMap::with_capacity(entries.len());
    for entry in entries {
        headers.append(
            HeaderName::try_from(entry.name.as_str())?,
            HeaderValue::try_from(entry.value.as_str())?,
        );
    }
    Ok(headers)
}
