use crate::response::RawResponse;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri};
use std::time::Duration;
use thiserror::Error;

/// Boxed error used for causes coming from pluggable collaborators
/// (serializers, compressors, tracers, transports).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Classification of URL resolution failures.
///
/// Provides programmatic matching for different failure modes without
/// relying on unstable error message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    /// URL could not be parsed (malformed syntax)
    ParseError,
    /// URL is missing required host/authority component
    MissingAuthority,
    /// A relative URL was given but the client has no base URI
    MissingBaseUri,
}

/// Failure reported by a transport while executing a single request.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TransportError {
    /// The request did not complete within the transport timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection could not be established (DNS, refused, unreachable)
    #[error("connection failed: {0}")]
    Connect(#[source] BoxError),

    /// Any other transport failure (reset, protocol error, body stream error)
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// Response body exceeded the configured size limit
    #[error("response body too large: limit {limit} bytes, got {actual} bytes")]
    BodyTooLarge { limit: usize, actual: usize },
}

/// Snapshot of the request that was handed to the transport.
///
/// Carried by [`RestError::Send`] so the caller can see exactly what failed.
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Serialized body bytes, if the verb carried a body
    pub body: Option<Bytes>,
}

/// REST client error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RestError {
    /// Serializing the request body failed
    #[error("failed to serialize request body: {source}")]
    Serialization {
        #[source]
        source: BoxError,
    },

    /// The transport failed to deliver the request or read the response
    #[error("failed to send {} {}: {source}", .request.method, .request.uri)]
    Send {
        request: Box<SentRequest>,
        #[source]
        source: TransportError,
    },

    /// The call was cancelled through its cancellation token
    #[error("request cancelled")]
    Cancelled,

    /// The response payload could not be deserialized
    ///
    /// `payload` holds the (decompressed) bytes that failed to deserialize.
    #[error("failed to deserialize response body ({} bytes): {source}", .payload.len())]
    Deserialization {
        payload: Bytes,
        #[source]
        source: BoxError,
    },

    /// The response payload could not be decompressed
    #[error("failed to decompress response body ({} bytes): {source}", .payload.len())]
    Decompression {
        payload: Bytes,
        #[source]
        source: BoxError,
    },

    /// The response status was outside the success range
    #[error(
        "non-successful HTTP status {} for {} {}",
        .response.status,
        .response.method,
        .response.uri
    )]
    Status { response: Box<RawResponse> },

    /// Request building failed
    #[error("failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    /// Invalid header name
    #[error("invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// Invalid header value
    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Invalid URL
    ///
    /// Use the `kind` field for programmatic matching. The `reason` field contains
    /// a diagnostic message intended for logging only.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUri {
        url: String,
        kind: InvalidUriKind,
        reason: String,
    },

    /// URL scheme rejected by the transport security configuration
    #[error("URL scheme '{scheme}' not allowed: {reason}")]
    InvalidScheme { scheme: String, reason: String },

    /// TLS setup for the default transport failed
    #[error("TLS error: {0}")]
    Tls(#[source] BoxError),
}

impl RestError {
    /// Returns `true` if the transport gave up because of its timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            RestError::Send {
                source: TransportError::Timeout(_),
                ..
            }
        )
    }

    /// Returns `true` if the call was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RestError::Cancelled)
    }

    /// Status code of the failed response, for [`RestError::Status`].
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RestError::Status { response } => Some(response.status),
            _ => None,
        }
    }

    /// Raw payload attached to the error, if any.
    #[must_use]
    pub fn payload(&self) -> Option<&Bytes> {
        match self {
            RestError::Deserialization { payload, .. }
            | RestError::Decompression { payload, .. } => Some(payload),
            RestError::Status { response } => Some(&response.payload),
            _ => None,
        }
    }
}
