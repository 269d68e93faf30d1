use crate::builder::RestClientBuilder;
use crate::compression::{Compressor, content_encoding_matches};
use crate::config::RestClientConfig;
use crate::converter::{ConvertContext, RequestConverter, body_allowed, parse_base_uri};
use crate::error::{RestError, SentRequest, TransportError};
use crate::request::Request;
use crate::response::{RawResponse, Response, read_body_limited};
use crate::serialization::{JsonAdapter, SerializationAdapter};
use crate::trace::{TraceEvent, Tracer, emit};
use crate::transport::TransportFactory;
use bytes::Bytes;
use http::HeaderMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use url::Url;

/// Typed REST client
///
/// Each call is one round trip: serialize the body (for `POST`, `PUT` and
/// `PATCH`), convert to a transport request, execute it on the transport
/// cached under the client name, read the bounded payload, decompress it if a
/// compressor matches, trace, check the status and deserialize.
///
/// `send` takes `&self`, so a client can serve concurrent calls; the mutators
/// take `&mut self` and therefore cannot run while calls are in flight.
///
/// # Example
///
/// ```ignore
/// use modkit_rest::RestClient;
///
/// let client = RestClient::builder()
///     .base_uri("https://api.example.com/v1/")
///     .default_header("accept", "application/json")
///     .build()?;
///
/// let order: Order = client.get("orders/42").await?.into_body();
/// let created: Response<Order> = client.post("orders", &new_order).await?;
/// ```
pub struct RestClient<A = JsonAdapter> {
    pub(crate) config: RestClientConfig,
    pub(crate) base_uri: Option<Url>,
    pub(crate) default_headers: HeaderMap,
    pub(crate) adapter: A,
    pub(crate) compressor: Option<Arc<dyn Compressor>>,
    pub(crate) tracer: Option<Arc<dyn Tracer>>,
    pub(crate) converter: Arc<dyn RequestConverter>,
    pub(crate) factory: Arc<dyn TransportFactory>,
}

impl RestClient<JsonAdapter> {
    /// Start building a JSON client
    #[must_use]
    pub fn builder() -> RestClientBuilder<JsonAdapter> {
        RestClientBuilder::new()
    }
}

impl<A: SerializationAdapter> RestClient<A> {
    /// Execute `request` and deserialize the payload into `Res`.
    ///
    /// # Errors
    /// - [`RestError::Cancelled`] if the request's token fires before the
    ///   response is fully read
    /// - [`RestError::Send`] for any other transport failure
    /// - [`RestError::Status`] for statuses outside the success range when
    ///   `throw_on_failure` is on
    /// - [`RestError::Serialization`], [`RestError::Decompression`] or
    ///   [`RestError::Deserialization`] when the payload cannot be converted
    /// - URI and header errors from request conversion
    pub async fn send<Res, Req>(&self, request: Request<Req>) -> Result<Response<Res>, RestError>
    where
        Res: DeserializeOwned,
        Req: Serialize,
    {
        let parts = request.into_parts()?;
        let cancellation = parts.cancellation;
        if cancellation
            .as_ref()
            .is_some_and(tokio_util::sync::CancellationToken::is_cancelled)
        {
            tracing::error!(method = %parts.method, uri = %parts.uri, "request cancelled before dispatch");
            return Err(RestError::Cancelled);
        }

        let body = match parts.body {
            Some(body) if body_allowed(&parts.method) => {
                let bytes = self
                    .adapter
                    .serialize(&body, &parts.headers)
                    .map_err(|source| RestError::Serialization { source })?;
                Some(Bytes::from(bytes))
            }
            _ => None,
        };

        let transport_request = self.converter.convert(ConvertContext {
            method: parts.method,
            uri: &parts.uri,
            base_uri: self.base_uri.as_ref(),
            default_headers: &self.default_headers,
            headers: parts.headers,
            body: body.clone(),
            content_type: self.adapter.content_type(),
            security: self.config.transport.security,
        })?;

        let transport = self
            .factory
            .transport(&self.config.name, &self.config.transport)?;

        let sent = SentRequest {
            method: transport_request.method().clone(),
            uri: transport_request.uri().clone(),
            headers: transport_request.headers().clone(),
            body,
        };

        if let Some(tracer) = &self.tracer {
            emit(
                tracer.as_ref(),
                &TraceEvent::request(
                    sent.method.clone(),
                    sent.uri.clone(),
                    sent.headers.clone(),
                    sent.body.clone(),
                ),
            );
        }

        let max_body_size = self.config.max_body_size;
        let exchange = async move {
            let response = transport.oneshot(transport_request).await?;
            let (head, body) = response.into_parts();
            let payload = read_body_limited(body, max_body_size).await?;
            Ok::<_, TransportError>((head, payload))
        };

        let outcome = match &cancellation {
            Some(token) => tokio::select! {
                biased;
                () = token.cancelled() => None,
                result = exchange => Some(result),
            },
            None => Some(exchange.await),
        };

        let (head, payload) = match outcome {
            None => {
                tracing::error!(method = %sent.method, uri = %sent.uri, "request cancelled");
                self.trace_error(&sent, &RestError::Cancelled);
                return Err(RestError::Cancelled);
            }
            Some(Err(source)) => {
                self.trace_error(&sent, &source);
                tracing::error!(
                    method = %sent.method,
                    uri = %sent.uri,
                    error = %source,
                    "request failed"
                );
                return Err(RestError::Send {
                    request: Box::new(sent),
                    source,
                });
            }
            Some(Ok(exchange)) => exchange,
        };

        self.complete(sent, head, payload)
    }

    /// `GET uri`
    ///
    /// # Errors
    /// See [`send`](Self::send).
    pub async fn get<T: DeserializeOwned>(&self, uri: &str) -> Result<Response<T>, RestError> {
        self.send(Request::get(uri)).await
    }

    /// `DELETE uri`
    ///
    /// # Errors
    /// See [`send`](Self::send).
    pub async fn delete<T: DeserializeOwned>(&self, uri: &str) -> Result<Response<T>, RestError> {
        self.send(Request::delete(uri)).await
    }

    /// `HEAD uri`; the (empty) payload is deserialized as `()`
    ///
    /// # Errors
    /// See [`send`](Self::send).
    pub async fn head(&self, uri: &str) -> Result<Response<()>, RestError> {
        self.send(Request::head(uri)).await
    }

    /// `POST uri` with a serialized body
    ///
    /// # Errors
    /// See [`send`](Self::send).
    pub async fn post<T, B>(&self, uri: &str, body: &B) -> Result<Response<T>, RestError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Request::post(uri, body)).await
    }

    /// `PUT uri` with a serialized body
    ///
    /// # Errors
    /// See [`send`](Self::send).
    pub async fn put<T, B>(&self, uri: &str, body: &B) -> Result<Response<T>, RestError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Request::put(uri, body)).await
    }

    /// `PATCH uri` with a serialized body
    ///
    /// # Errors
    /// See [`send`](Self::send).
    pub async fn patch<T, B>(&self, uri: &str, body: &B) -> Result<Response<T>, RestError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Request::patch(uri, body)).await
    }

    fn trace_error(&self, sent: &SentRequest, error: &dyn std::error::Error) {
        if let Some(tracer) = &self.tracer {
            emit(
                tracer.as_ref(),
                &TraceEvent::error(
                    sent.method.clone(),
                    sent.uri.clone(),
                    sent.headers.clone(),
                    error.to_string(),
                ),
            );
        }
    }

    /// Decompress, trace, check the status and deserialize a received payload
    fn complete<Res: DeserializeOwned>(
        &self,
        sent: SentRequest,
        head: http::response::Parts,
        payload: Bytes,
    ) -> Result<Response<Res>, RestError> {
        let payload = self.decompress(&head.headers, payload)?;

        if let Some(tracer) = &self.tracer {
            emit(
                tracer.as_ref(),
                &TraceEvent::response(
                    sent.method.clone(),
                    sent.uri.clone(),
                    head.status,
                    head.headers.clone(),
                    payload.clone(),
                ),
            );
        }

        let success = self.config.is_success(head.status);
        let raw = RawResponse {
            status: head.status,
            method: sent.method,
            uri: sent.uri,
            headers: head.headers,
            payload,
        };

        if !success && self.config.throw_on_failure {
            tracing::debug!(
                method = %raw.method,
                uri = %raw.uri,
                status = raw.status.as_u16(),
                "non-successful status"
            );
            return Err(RestError::Status {
                response: Box::new(raw),
            });
        }

        let body = raw.deserialize(&self.adapter)?;
        tracing::debug!(
            method = %raw.method,
            uri = %raw.uri,
            status = raw.status.as_u16(),
            bytes = raw.payload.len(),
            "request completed"
        );
        Ok(Response::new(raw, body, success))
    }

    fn decompress(&self, headers: &HeaderMap, payload: Bytes) -> Result<Bytes, RestError> {
        match &self.compressor {
            Some(compressor) if content_encoding_matches(headers, compressor.encoding()) => {
                compressor
                    .decompress(&payload)
                    .map_err(|source| RestError::Decompression { payload, source })
            }
            _ => Ok(payload),
        }
    }

    /// Logical name; transports are looked up under it
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Configuration the client was built with, including runtime changes
    #[must_use]
    pub fn config(&self) -> &RestClientConfig {
        &self.config
    }

    /// Serializer used for request and response bodies
    #[must_use]
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Base URI relative request URIs are resolved against
    #[must_use]
    pub fn base_uri(&self) -> Option<&Url> {
        self.base_uri.as_ref()
    }

    /// Replace (or clear) the base URI
    ///
    /// # Errors
    /// Returns [`RestError::InvalidUri`] if `base_uri` is not an absolute URL with a host;
    /// the previous base URI is kept in that case.
    pub fn set_base_uri(&mut self, base_uri: Option<&str>) -> Result<(), RestError> {
        self.base_uri = base_uri.map(parse_base_uri).transpose()?;
        self.config.base_uri = base_uri.map(str::to_owned);
        Ok(())
    }

    /// Whether non-success statuses are returned as [`RestError::Status`]
    #[must_use]
    pub fn throw_on_failure(&self) -> bool {
        self.config.throw_on_failure
    }

    /// Toggle [`RestError::Status`] for non-success statuses
    pub fn set_throw_on_failure(&mut self, enabled: bool) {
        self.config.throw_on_failure = enabled;
    }

    /// Timeout the transport is (or will be) built with
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.config.transport.timeout
    }

    /// Change the transport timeout.
    ///
    /// The transport for this client's name is dropped from the factory so the
    /// next call builds one with the new timeout. A transport supplied through
    /// [`RestClientBuilder::transport`] is never rebuilt; the new value is only
    /// recorded and a warning is logged.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.config.transport.timeout = timeout;
        if !self.factory.invalidate(&self.config.name) {
            tracing::warn!(
                client = %self.config.name,
                timeout = ?timeout,
                "transport factory does not rebuild transports; new timeout not applied"
            );
        }
    }

    /// Headers sent with every call
    #[must_use]
    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    /// Headers sent with every call; a request header replaces defaults of the same name
    pub fn default_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.default_headers
    }

    /// Replace (or remove) the response compressor
    pub fn set_compressor(&mut self, compressor: Option<Arc<dyn Compressor>>) {
        self.compressor = compressor;
    }

    /// Replace (or remove) the tracer
    pub fn set_tracer(&mut self, tracer: Option<Arc<dyn Tracer>>) {
        self.tracer = tracer;
    }
}
