//! Transport abstraction and the default hyper-based transport.
//!
//! A [`Transport`] is a type-erased tower service executing one
//! `http::Request<Full<Bytes>>`. It is cloned per call, so any number of calls
//! may be in flight on one transport without queueing.

mod factory;
mod tls;

pub use factory::{
    CachingTransportFactory, SingletonTransportFactory, TransportConstructor, TransportFactory,
};

use crate::config::{TransportConfig, TransportSecurity};
use crate::error::{BoxError, RestError, TransportError};
use crate::layers::{RedirectPolicy, SpanLayer};
use crate::response::ResponseBody;
use bytes::Bytes;
use http::{HeaderValue, Response};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::time::Duration;
use tower::timeout::TimeoutLayer;
use tower::util::BoxCloneSyncService;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::decompression::DecompressionLayer;
use tower_http::follow_redirect::FollowRedirectLayer;
use tower_http::set_header::SetRequestHeaderLayer;

/// Request type accepted by a [`Transport`]
pub type TransportRequest = http::Request<Full<Bytes>>;

/// Cloneable, type-erased transport service.
///
/// Any tower service with matching request/response/error types can be turned
/// into a transport with [`BoxCloneSyncService::new`], which is how tests and
/// callers plug in their own stacks.
pub type Transport = BoxCloneSyncService<TransportRequest, Response<ResponseBody>, TransportError>;

/// Box any response body into [`ResponseBody`].
#[must_use]
pub fn boxed_body<B>(response: Response<B>) -> Response<ResponseBody>
where
    B: http_body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<BoxError>,
{
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, body.map_err(Into::into).boxed())
}

/// Build the default transport for `name` from `config`.
///
/// Layer stack, outer to inner:
/// `SpanLayer -> Timeout -> User-Agent -> Decompression -> FollowRedirect -> hyper client`.
///
/// Decompression only advertises and decodes encodings when
/// `config.auto_decompress` is set; otherwise bodies pass through untouched.
///
/// # Errors
/// Returns [`RestError::Tls`] if the TLS connector cannot be built and
/// [`RestError::InvalidHeaderValue`] if the User-Agent is not a valid header value.
pub fn build_transport(name: &str, config: &TransportConfig) -> Result<Transport, RestError> {
    if config.security == TransportSecurity::AllowInsecureHttp {
        tracing::warn!(
            client = name,
            "insecure HTTP enabled (TransportSecurity::AllowInsecureHttp); \
             use only for testing with mock servers"
        );
    }

    let https = tls::https_connector(config.tls_roots, config.security)?;

    let mut client_builder = Client::builder(TokioExecutor::new());
    // pool_idle_timeout needs a timer to take effect
    client_builder
        .pool_timer(TokioTimer::new())
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .http2_only(false);
    if let Some(idle_timeout) = config.pool_idle_timeout {
        client_builder.pool_idle_timeout(idle_timeout);
    }
    let hyper_client = client_builder.build::<_, Full<Bytes>>(https);

    let user_agent = HeaderValue::from_str(&config.user_agent)?;
    let decode = config.auto_decompress;
    let timeout = config.timeout;

    let service = ServiceBuilder::new()
        .layer(SpanLayer::new(name))
        .layer(TimeoutLayer::new(timeout))
        .layer(SetRequestHeaderLayer::if_not_present(
            http::header::USER_AGENT,
            user_agent,
        ))
        .layer(DecompressionLayer::new().gzip(decode).deflate(decode).br(decode))
        .layer(FollowRedirectLayer::with_policy(RedirectPolicy::new(
            config.redirect.clone(),
        )))
        .service(hyper_client)
        .map_response(boxed_body)
        .map_err(move |e: BoxError| map_tower_error(e, timeout));

    tracing::debug!(
        client = name,
        timeout = ?timeout,
        auto_decompress = decode,
        max_redirects = config.redirect.max_redirects,
        same_origin_only = config.redirect.same_origin_only,
        "built transport"
    );

    Ok(BoxCloneSyncService::new(service))
}

/// Classify a boxed stack error.
fn map_tower_error(err: BoxError, timeout: Duration) -> TransportError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return TransportError::Timeout(timeout);
    }

    match err.downcast::<TransportError>() {
        Ok(transport_err) => *transport_err,
        Err(other) => {
            if let Some(client_err) = other.downcast_ref::<hyper_util::client::legacy::Error>()
                && client_err.is_connect()
            {
                return TransportError::Connect(other);
            }
            TransportError::Transport(other)
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Reset;

    impl fmt::Display for Reset {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("connection reset")
        }
    }

    impl std::error::Error for Reset {}

    #[test]
    fn test_map_tower_error_timeout() {
        let err: BoxError = Box::new(tower::timeout::error::Elapsed::new());
        let mapped = map_tower_error(err, Duration::from_secs(3));
        assert!(matches!(mapped, TransportError::Timeout(d) if d == Duration::from_secs(3)));
    }

    #[test]
    fn test_map_tower_error_keeps_transport_error() {
        let err: BoxError = Box::new(TransportError::BodyTooLarge {
            limit: 1,
            actual: 2,
        });
        let mapped = map_tower_error(err, Duration::from_secs(3));
        assert!(matches!(
            mapped,
            TransportError::BodyTooLarge {
                limit: 1,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_map_tower_error_other() {
        let mapped = map_tower_error(Box::new(Reset), Duration::from_secs(3));
        match mapped {
            TransportError::Transport(source) => {
                assert_eq!(source.to_string(), "connection reset");
            }
            other => panic!("expected Transport, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_build_transport_rejects_bad_user_agent() {
        let config = TransportConfig {
            user_agent: "bad\nagent".to_owned(),
            ..TransportConfig::default()
        };
        let err = build_transport("test", &config).err().unwrap();
        assert!(matches!(err, RestError::InvalidHeaderValue(_)));
    }

    #[tokio::test]
    async fn test_build_transport_default_config() {
        assert!(build_transport("test", &TransportConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_boxed_body_preserves_parts() {
        let response = Response::builder()
            .status(201)
            .header("x-id", "7")
            .body(Full::new(Bytes::from_static(b"done")))
            .unwrap();
        let boxed = boxed_body(response);
        assert_eq!(boxed.status(), 201);
        assert_eq!(boxed.headers()["x-id"], "7");
        let bytes = boxed.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes.as_ref(), b"done");
    }

    #[tokio::test]
    async fn test_connection_refused_maps_to_connect() {
        let config = TransportConfig {
            security: TransportSecurity::AllowInsecureHttp,
            timeout: Duration::from_secs(5),
            ..TransportConfig::default()
        };
        let transport = build_transport("test", &config).unwrap();

        // Bind then drop to get a local port with nothing listening.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let request = http::Request::get(format!("http://127.0.0.1:{port}/"))
            .body(Full::new(Bytes::new()))
            .unwrap();

        let err = transport.oneshot(request).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)), "got {err:?}");
    }
}
