//! Turning a [`Request`](crate::Request) into a transport request.

use crate::config::TransportSecurity;
use crate::error::{InvalidUriKind, RestError};
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, Uri};
use http_body_util::Full;
use url::Url;

/// Whether requests with `method` carry a serialized body.
///
/// Only `POST`, `PUT` and `PATCH` do; a body supplied with any other method is
/// never serialized or sent.
#[must_use]
pub fn body_allowed(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

/// Everything a [`RequestConverter`] needs for one call.
#[derive(Debug)]
#[non_exhaustive]
pub struct ConvertContext<'a> {
    pub method: Method,
    /// Request URI as given by the caller (absolute or relative)
    pub uri: &'a str,
    /// Client base URI, normalized to end with `/`
    pub base_uri: Option<&'a Url>,
    pub default_headers: &'a HeaderMap,
    pub headers: HeaderMap,
    /// Serialized body; `None` when the method carries no body
    pub body: Option<Bytes>,
    /// Content type of the serialization adapter
    pub content_type: &'static str,
    pub security: TransportSecurity,
}

/// Builds the transport-level request.
pub trait RequestConverter: Send + Sync {
    /// # Errors
    /// Returns an error if the URI cannot be resolved or the request cannot be built.
    fn convert(&self, ctx: ConvertContext<'_>) -> Result<http::Request<Full<Bytes>>, RestError>;
}

/// Standard conversion: resolve the URI against the base, merge headers,
/// attach the body.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRequestConverter;

impl RequestConverter for DefaultRequestConverter {
    fn convert(&self, ctx: ConvertContext<'_>) -> Result<http::Request<Full<Bytes>>, RestError> {
        let uri = resolve_uri(ctx.base_uri, ctx.uri, ctx.security)?;
        let mut headers = merge_headers(ctx.default_headers, ctx.headers);

        if ctx.body.is_some() && !headers.contains_key(http::header::CONTENT_TYPE) {
            headers.insert(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static(ctx.content_type),
            );
        }

        let mut request = http::Request::builder()
            .method(ctx.method)
            .uri(uri)
            .body(Full::new(ctx.body.unwrap_or_default()))?;
        *request.headers_mut() = headers;
        Ok(request)
    }
}

/// Parse and normalize a base URI so relative paths are appended to its path.
///
/// # Errors
/// Returns [`RestError::InvalidUri`] if `raw` is not an absolute URL with a host.
pub fn parse_base_uri(raw: &str) -> Result<Url, RestError> {
    let mut url = Url::parse(raw).map_err(|e| RestError::InvalidUri {
        url: raw.to_owned(),
        kind: InvalidUriKind::ParseError,
        reason: e.to_string(),
    })?;
    if !url.has_host() {
        return Err(RestError::InvalidUri {
            url: raw.to_owned(),
            kind: InvalidUriKind::MissingAuthority,
            reason: "base URI has no host".to_owned(),
        });
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Resolve `uri` against `base` and check it against `security`.
///
/// Absolute URIs are used as-is. Relative URIs are appended to the base path
/// (a leading `/` does not reset it); an empty URI resolves to the base.
///
/// # Errors
/// Returns [`RestError::InvalidUri`] for malformed URIs, relative URIs without
/// a base, or URIs without a host, and [`RestError::InvalidScheme`] for schemes
/// other than `https` (and `http` when insecure HTTP is allowed).
pub fn resolve_uri(
    base: Option<&Url>,
    uri: &str,
    security: TransportSecurity,
) -> Result<Uri, RestError> {
    let resolved = match Url::parse(uri) {
        Ok(absolute) => absolute,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let Some(base) = base else {
                return Err(RestError::InvalidUri {
                    url: uri.to_owned(),
                    kind: InvalidUriKind::MissingBaseUri,
                    reason: "relative URI but the client has no base URI".to_owned(),
                });
            };
            base.join(uri.trim_start_matches('/'))
                .map_err(|e| RestError::InvalidUri {
                    url: uri.to_owned(),
                    kind: InvalidUriKind::ParseError,
                    reason: e.to_string(),
                })?
        }
        Err(e) => {
            return Err(RestError::InvalidUri {
                url: uri.to_owned(),
                kind: InvalidUriKind::ParseError,
                reason: e.to_string(),
            });
        }
    };

    match resolved.scheme() {
        "https" => {}
        "http" => {
            if security == TransportSecurity::TlsOnly {
                return Err(RestError::InvalidScheme {
                    scheme: "http".to_owned(),
                    reason: "HTTPS required (transport security is TlsOnly)".to_owned(),
                });
            }
        }
        other => {
            return Err(RestError::InvalidScheme {
                scheme: other.to_owned(),
                reason: "only http:// and https:// schemes are supported".to_owned(),
            });
        }
    }

    if !resolved.has_host() {
        return Err(RestError::InvalidUri {
            url: resolved.to_string(),
            kind: InvalidUriKind::MissingAuthority,
            reason: "URI has no host".to_owned(),
        });
    }

    resolved
        .as_str()
        .parse::<Uri>()
        .map_err(|e| RestError::InvalidUri {
            url: resolved.to_string(),
            kind: InvalidUriKind::ParseError,
            reason: e.to_string(),
        })
}

/// Defaults first; a request header replaces every default value of the same name.
#[must_use]
pub fn merge_headers(defaults: &HeaderMap, request: HeaderMap) -> HeaderMap {
    let mut merged = defaults.clone();
    for name in request.keys() {
        merged.remove(name);
    }
    let mut current = None;
    for (name, value) in request {
        if let Some(name) = name {
            current = Some(name);
        }
        if let Some(name) = &current {
            merged.append(name.clone(), value);
        }
    }
    merged
}
