use crate::error::{BoxError, RestError, TransportError};
use crate::serialization::SerializationAdapter;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;

/// Type-erased response body produced by a [`Transport`](crate::Transport).
pub type ResponseBody = http_body_util::combinators::BoxBody<Bytes, BoxError>;

/// Response without a typed body.
///
/// Returned inside [`RestError::Status`] so the caller can still inspect the
/// status, headers and payload of a failed call and decode an error document
/// with any adapter.
///
/// `payload` is the body after decompression.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub payload: Bytes,
}

impl RawResponse {
    /// Decode the payload with `adapter`.
    ///
    /// # Errors
    /// Returns [`RestError::Deserialization`] carrying the payload if decoding fails.
    ///
    /// # Example
    ///
    /// ```ignore
    /// match client.get::<Order>("orders/42").await {
    ///     Err(RestError::Status { response }) => {
    ///         let problem: Problem = response.deserialize(&JsonAdapter)?;
    ///     }
    ///     other => { /* ... */ }
    /// }
    /// ```
    pub fn deserialize<T, A>(&self, adapter: &A) -> Result<T, RestError>
    where
        T: DeserializeOwned,
        A: SerializationAdapter,
    {
        adapter
            .deserialize(&self.payload, &self.headers)
            .map_err(|source| RestError::Deserialization {
                payload: self.payload.clone(),
                source,
            })
    }
}

/// Typed response of a completed call.
///
/// The body is only present once deserialization succeeded; a payload that
/// fails to decode surfaces as [`RestError::Deserialization`] instead.
#[derive(Debug, Clone)]
pub struct Response<B> {
    raw: RawResponse,
    body: B,
    success: bool,
}

impl<B> Response<B> {
    pub(crate) fn new(raw: RawResponse, body: B, success: bool) -> Self {
        Self { raw, body, success }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.raw.status
    }

    /// Whether the status fell into the client's success range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Method of the request that produced this response
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.raw.method
    }

    /// Resolved URI of the request that produced this response
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.raw.uri
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.raw.headers
    }

    /// Payload bytes after decompression
    #[must_use]
    pub fn raw(&self) -> &Bytes {
        &self.raw.payload
    }

    #[must_use]
    pub fn body(&self) -> &B {
        &self.body
    }

    #[must_use]
    pub fn into_body(self) -> B {
        self.body
    }

    /// Split into the untyped response and the typed body.
    #[must_use]
    pub fn into_parts(self) -> (RawResponse, B) {
        (self.raw, self.body)
    }
}

/// Collect a response body, failing once more than `limit` bytes arrive.
pub(crate) async fn read_body_limited(
    body: ResponseBody,
    limit: usize,
) -> Result<Bytes, TransportError> {
    let mut collected = Vec::new();
    let mut body = std::pin::pin!(body);

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(TransportError::Transport)?;
        if let Some(chunk) = frame.data_ref() {
            if collected.len() + chunk.len() > limit {
                return Err(TransportError::BodyTooLarge {
                    limit,
                    actual: collected.len() + chunk.len(),
                });
            }
            collected.extend_from_slice(chunk);
        }
    }

    Ok(Bytes::from(collected))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::serialization::JsonAdapter;
    use http_body_util::Full;
    use serde::Deserialize;

    fn boxed(bytes: &'static [u8]) -> ResponseBody {
        Full::new(Bytes::from_static(bytes))
            .map_err(|never| match never {})
            .boxed()
    }

    fn raw(payload: &'static [u8]) -> RawResponse {
        RawResponse {
            status: StatusCode::NOT_FOUND,
            method: Method::GET,
            uri: Uri::from_static("https://api.example.com/orders/42"),
            headers: HeaderMap::new(),
            payload: Bytes::from_static(payload),
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Problem {
        title: String,
    }

    #[tokio::test]
    async fn test_read_body_within_limit() {
        let bytes = read_body_limited(boxed(b"hello"), 5).await.unwrap();
        assert_eq!(bytes.as_ref(), b"hello");
    }

    #[tokio::test]
    async fn test_read_body_over_limit() {
        let err = read_body_limited(boxed(b"hello world"), 5)
            .await
            .unwrap_err();
        match err {
            TransportError::BodyTooLarge { limit, actual } => {
                assert_eq!(limit, 5);
                assert_eq!(actual, 11);
            }
            other => panic!("expected BodyTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn test_raw_response_deserialize() {
        let problem: Problem = raw(br#"{"title":"not found"}"#)
            .deserialize(&JsonAdapter)
            .unwrap();
        assert_eq!(problem.title, "not found");
    }

    #[test]
    fn test_raw_response_deserialize_failure_keeps_payload() {
        let err = raw(b"<html>").deserialize::<Problem, _>(&JsonAdapter).unwrap_err();
        assert!(matches!(err, RestError::Deserialization { .. }));
        assert_eq!(err.payload().unwrap().as_ref(), b"<html>");
    }

    #[test]
    fn test_response_accessors() {
        let response = Response::new(raw(b"{}"), 5u32, false);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(!response.is_success());
        assert_eq!(*response.method(), Method::GET);
        assert_eq!(response.uri().path(), "/orders/42");
        assert_eq!(response.raw().as_ref(), b"{}");
        assert_eq!(*response.body(), 5);
        let (raw, body) = response.into_parts();
        assert_eq!(raw.status, StatusCode::NOT_FOUND);
        assert_eq!(body, 5);
    }
}
