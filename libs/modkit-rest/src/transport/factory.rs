use super::{Transport, build_transport};
use crate::config::TransportConfig;
use crate::error::RestError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fmt;
use std::sync::Arc;

/// Supplies the transport used for a logical client name.
pub trait TransportFactory: Send + Sync {
    /// Return the transport for `name`, creating it from `config` if needed.
    ///
    /// # Errors
    /// Returns the construction error if a new transport cannot be built.
    fn transport(&self, name: &str, config: &TransportConfig) -> Result<Transport, RestError>;

    /// Forget any transport held for `name` so the next lookup rebuilds it.
    ///
    /// Returns `false` when the factory never rebuilds transports, so
    /// configuration changes cannot reach the transport it hands out.
    fn invalidate(&self, _name: &str) -> bool {
        false
    }
}

/// Function that builds a new transport for a name.
pub type TransportConstructor =
    dyn Fn(&str, &TransportConfig) -> Result<Transport, RestError> + Send + Sync;

/// Creates one transport per logical name and hands out clones of it.
///
/// Creation runs under the map entry lock, so concurrent first calls for the
/// same unseen name build exactly one transport. Cached transports keep the
/// configuration they were built with; [`evict`](Self::evict) forces a rebuild.
pub struct CachingTransportFactory {
    transports: DashMap<String, Transport>,
    constructor: Arc<TransportConstructor>,
}

impl CachingTransportFactory {
    /// Factory building the default hyper transport.
    #[must_use]
    pub fn new() -> Self {
        Self::with_constructor(build_transport)
    }

    /// Factory building transports with `constructor`.
    #[must_use]
    pub fn with_constructor<F>(constructor: F) -> Self
    where
        F: Fn(&str, &TransportConfig) -> Result<Transport, RestError> + Send + Sync + 'static,
    {
        Self {
            transports: DashMap::new(),
            constructor: Arc::new(constructor),
        }
    }

    /// Drop the cached transport for `name`; returns whether one was cached.
    #[must_use = "returns whether a transport was cached"]
    pub fn evict(&self, name: &str) -> bool {
        let removed = self.transports.remove(name).is_some();
        if removed {
            tracing::debug!(client = name, "evicted cached transport");
        }
        removed
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.transports.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.transports.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }
}

impl Default for CachingTransportFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CachingTransportFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingTransportFactory")
            .field("cached", &self.transports.len())
            .finish_non_exhaustive()
    }
}

impl TransportFactory for CachingTransportFactory {
    fn transport(&self, name: &str, config: &TransportConfig) -> Result<Transport, RestError> {
        if let Some(cached) = self.transports.get(name) {
            return Ok(cached.value().clone());
        }

        match self.transports.entry(name.to_owned()) {
            Entry::Occupied(cached) => Ok(cached.get().clone()),
            Entry::Vacant(slot) => {
                let transport = (self.constructor)(name, config)?;
                tracing::debug!(client = name, "created transport");
                Ok(slot.insert(transport).value().clone())
            }
        }
    }

    fn invalidate(&self, name: &str) -> bool {
        if !self.evict(name) {
            tracing::debug!(client = name, "no cached transport to invalidate");
        }
        true
    }
}

/// Hands out the same pre-built transport for every name.
#[derive(Clone)]
pub struct SingletonTransportFactory {
    transport: Transport,
}

impl SingletonTransportFactory {
    /// Factory returning clones of `transport`
    #[must_use]
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }
}

impl fmt::Debug for SingletonTransportFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonTransportFactory")
            .finish_non_exhaustive()
    }
}

impl TransportFactory for SingletonTransportFactory {
    fn transport(&self, _name: &str, _config: &TransportConfig) -> Result<Transport, RestError> {
        Ok(self.transport.clone())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::testing::ok_transport;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    fn counting_factory(created: Arc<AtomicUsize>) -> CachingTransportFactory {
        CachingTransportFactory::with_constructor(move |_name, _config| {
            created.fetch_add(1, Ordering::SeqCst);
            // Widen the window in which racing callers could build a second one.
            std::thread::sleep(Duration::from_millis(20));
            Ok(ok_transport())
        })
    }

    #[test]
    fn test_transport_cached_per_name() {
        let created = Arc::new(AtomicUsize::new(0));
        let factory = counting_factory(Arc::clone(&created));
        let config = TransportConfig::default();

        factory.transport("a", &config).unwrap();
        factory.transport("a", &config).unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 1);

        factory.transport("b", &config).unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(factory.len(), 2);
        assert!(factory.contains("a"));
    }

    #[test]
    fn test_concurrent_first_use_creates_one_transport() {
        const CALLERS: usize = 16;
        let created = Arc::new(AtomicUsize::new(0));
        let factory = counting_factory(Arc::clone(&created));
        let config = TransportConfig::default();
        let barrier = Barrier::new(CALLERS);

        std::thread::scope(|scope| {
            for _ in 0..CALLERS {
                scope.spawn(|| {
                    barrier.wait();
                    factory.transport("shared", &config).unwrap();
                });
            }
        });

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(factory.len(), 1);
    }

    #[test]
    fn test_evict_forces_rebuild() {
        let created = Arc::new(AtomicUsize::new(0));
        let factory = counting_factory(Arc::clone(&created));
        let config = TransportConfig::default();

        factory.transport("a", &config).unwrap();
        assert!(factory.evict("a"));
        assert!(!factory.evict("a"));
        assert!(factory.is_empty());

        factory.transport("a", &config).unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_constructor_error_is_not_cached() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let factory = {
            let attempts = Arc::clone(&attempts);
            CachingTransportFactory::with_constructor(move |_name, _config| {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(RestError::Tls("no roots".into()))
            })
        };
        let config = TransportConfig::default();

        assert!(factory.transport("a", &config).is_err());
        assert!(factory.transport("a", &config).is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(factory.is_empty());
    }

    #[tokio::test]
    async fn test_singleton_serves_every_name() {
        let factory = SingletonTransportFactory::new(ok_transport());
        let config = TransportConfig::default();

        for name in ["a", "b"] {
            let transport = factory.transport(name, &config).unwrap();
            let response = transport
                .oneshot(http::Request::new(http_body_util::Full::default()))
                .await
                .unwrap();
            assert_eq!(response.status(), 200);
        }
    }
}
