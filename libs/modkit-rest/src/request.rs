use crate::error::RestError;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use tokio_util::sync::CancellationToken;

/// Outbound call description.
///
/// The URI is either absolute or relative to the client's base URI. Whether
/// the body is serialized depends on the method: only `POST`, `PUT` and
/// `PATCH` carry one (see [`body_allowed`](crate::body_allowed)).
///
/// Header errors are deferred: an invalid name or value is remembered and
/// returned by the client when the request is sent.
///
/// # Example
///
/// ```ignore
/// let token = CancellationToken::new();
/// let request = Request::post("orders", &new_order)
///     .header("x-request-id", "abc-123")
///     .with_cancellation(token.clone());
/// let response: Response<Order> = client.send(request).await?;
/// ```
#[derive(Debug)]
pub struct Request<B = ()> {
    method: Method,
    uri: String,
    headers: HeaderMap,
    body: Option<B>,
    cancellation: Option<CancellationToken>,
    error: Option<RestError>,
}

impl Request<()> {
    /// Create a body-less request with an arbitrary method
    #[must_use]
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: HeaderMap::new(),
            body: None,
            cancellation: None,
            error: None,
        }
    }

    /// `GET uri`
    #[must_use]
    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::GET, uri)
    }

    /// `DELETE uri`
    #[must_use]
    pub fn delete(uri: impl Into<String>) -> Self {
        Self::new(Method::DELETE, uri)
    }

    /// `HEAD uri`
    #[must_use]
    pub fn head(uri: impl Into<String>) -> Self {
        Self::new(Method::HEAD, uri)
    }
}

impl<B> Request<B> {
    /// `POST uri` carrying `body`
    #[must_use]
    pub fn post(uri: impl Into<String>, body: B) -> Self {
        Request::<()>::new(Method::POST, uri).with_body(body)
    }

    /// `PUT uri` carrying `body`
    #[must_use]
    pub fn put(uri: impl Into<String>, body: B) -> Self {
        Request::<()>::new(Method::PUT, uri).with_body(body)
    }

    /// `PATCH uri` carrying `body`
    #[must_use]
    pub fn patch(uri: impl Into<String>, body: B) -> Self {
        Request::<()>::new(Method::PATCH, uri).with_body(body)
    }

    /// Attach a body, changing the body type.
    ///
    /// The body is ignored for methods that do not carry one.
    #[must_use]
    pub fn with_body<T>(self, body: T) -> Request<T> {
        Request {
            method: self.method,
            uri: self.uri,
            headers: self.headers,
            body: Some(body),
            cancellation: self.cancellation,
            error: self.error,
        }
    }

    /// Append a header (existing values with the same name are kept)
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }

        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            (Err(e), _) => {
                self.error = Some(RestError::InvalidHeaderName(e));
            }
            (_, Err(e)) => {
                self.error = Some(RestError::InvalidHeaderValue(e));
            }
        }
        self
    }

    /// Append already-validated headers
    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        let mut current = None;
        for (name, value) in headers {
            if let Some(name) = name {
                current = Some(name);
            }
            if let Some(name) = &current {
                self.headers.append(name.clone(), value);
            }
        }
        self
    }

    /// Abort the call when `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// URI as given, absolute or relative to the client's base URI
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Headers set on this request (defaults are merged at send time)
    #[must_use]
    pub fn header_map(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> Option<&B> {
        self.body.as_ref()
    }

    #[must_use]
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// Take the request apart, surfacing a deferred header error.
    pub(crate) fn into_parts(self) -> Result<RequestParts<B>, RestError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(RequestParts {
            method: self.method,
            uri: self.uri,
            headers: self.headers,
            body: self.body,
            cancellation: self.cancellation,
        })
    }
}

pub(crate) struct RequestParts<B> {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Option<B>,
    pub cancellation: Option<CancellationToken>,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_verb_constructors() {
        assert_eq!(*Request::get("a").method(), Method::GET);
        assert_eq!(*Request::delete("a").method(), Method::DELETE);
        assert_eq!(*Request::head("a").method(), Method::HEAD);
        assert_eq!(*Request::post("a", 1).method(), Method::POST);
        assert_eq!(*Request::put("a", 1).method(), Method::PUT);
        assert_eq!(*Request::patch("a", 1).method(), Method::PATCH);
        assert_eq!(Request::patch("items/1", 1).uri(), "items/1");
    }

    #[test]
    fn test_with_body_changes_type() {
        let request = Request::get("items").with_body("payload");
        assert_eq!(request.body(), Some(&"payload"));
        assert_eq!(*request.method(), Method::GET);
    }

    #[test]
    fn test_header_appends_values() {
        let request = Request::get("items")
            .header("x-tag", "a")
            .header("X-Tag", "b");
        let values: Vec<_> = request.header_map().get_all("x-tag").iter().collect();
        assert_eq!(values, ["a", "b"]);
    }

    #[test]
    fn test_headers_appends_multi_valued_map() {
        let mut extra = HeaderMap::new();
        extra.append("x-tag", HeaderValue::from_static("a"));
        extra.append("x-tag", HeaderValue::from_static("b"));
        extra.insert("accept", HeaderValue::from_static("text/plain"));

        let request = Request::get("items").headers(extra);
        assert_eq!(request.header_map().get_all("x-tag").iter().count(), 2);
        assert_eq!(request.header_map()["accept"], "text/plain");
    }

    #[test]
    fn test_invalid_header_is_deferred() {
        let request = Request::get("items")
            .header("bad header", "v")
            .header("x-ok", "v");
        assert!(request.header_map().is_empty());
        let err = request.into_parts().err().unwrap();
        assert!(matches!(err, RestError::InvalidHeaderName(_)));

        let err = Request::get("items")
            .header("x-ok", "line\nbreak")
            .into_parts()
            .err()
            .unwrap();
        assert!(matches!(err, RestError::InvalidHeaderValue(_)));
    }

    #[test]
    fn test_cancellation_token_is_kept() {
        let token = CancellationToken::new();
        let request = Request::get("items").with_cancellation(token.clone());
        token.cancel();
        assert!(request.cancellation().unwrap().is_cancelled());
    }
}
