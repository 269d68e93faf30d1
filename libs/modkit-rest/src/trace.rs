//! Observational hooks for request and response traffic.
//!
//! A [`Tracer`] sees every request right before dispatch, every response
//! after decompression, and an error event when a dispatched call is
//! cancelled or fails in the transport. Tracers never influence the outcome
//! of a call: a failing or panicking tracer is logged and ignored.

use crate::error::BoxError;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Target used by [`LogTracer`] events
pub const TRACE_TARGET: &str = "modkit_rest::trace";

/// Kind of a [`TraceEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceDirection {
    Request,
    Response,
    /// The exchange was cancelled or failed before a response was read
    Error,
}

impl fmt::Display for TraceDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceDirection::Request => f.write_str("request"),
            TraceDirection::Response => f.write_str("response"),
            TraceDirection::Error => f.write_str("error"),
        }
    }
}

/// One traced message.
///
/// Request events carry the serialized body and the headers actually sent;
/// response events carry the decoded payload, the response headers and the
/// status; error events carry the request headers and the failure text.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct TraceEvent {
    pub direction: TraceDirection,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub payload: Option<Bytes>,
    pub status: Option<StatusCode>,
    pub error: Option<String>,
}

impl TraceEvent {
    pub(crate) fn request(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        payload: Option<Bytes>,
    ) -> Self {
        Self {
            direction: TraceDirection::Request,
            method,
            uri,
            headers,
            payload,
            status: None,
            error: None,
        }
    }

    pub(crate) fn response(
        method: Method,
        uri: Uri,
        status: StatusCode,
        headers: HeaderMap,
        payload: Bytes,
    ) -> Self {
        Self {
            direction: TraceDirection::Response,
            method,
            uri,
            headers,
            payload: Some(payload),
            status: Some(status),
            error: None,
        }
    }

    pub(crate) fn error(method: Method, uri: Uri, headers: HeaderMap, error: String) -> Self {
        Self {
            direction: TraceDirection::Error,
            method,
            uri,
            headers,
            payload: None,
            status: None,
            error: Some(error),
        }
    }
}

/// Receives trace events.
///
/// Closures of the form `Fn(&TraceEvent) -> Result<(), BoxError>` are tracers
/// too.
pub trait Tracer: Send + Sync {
    /// Record one event.
    ///
    /// # Errors
    /// Errors are logged by the client and otherwise ignored.
    fn trace(&self, event: &TraceEvent) -> Result<(), BoxError>;
}

impl<F> Tracer for F
where
    F: Fn(&TraceEvent) -> Result<(), BoxError> + Send + Sync,
{
    fn trace(&self, event: &TraceEvent) -> Result<(), BoxError> {
        self(event)
    }
}

/// Tracer that writes `TRACE` level `tracing` events under [`TRACE_TARGET`].
#[derive(Debug, Clone)]
pub struct LogTracer {
    preview_limit: usize,
}

impl LogTracer {
    /// Default number of payload bytes included in an event
    pub const DEFAULT_PREVIEW_LIMIT: usize = 1024;

    #[must_use]
    pub fn new() -> Self {
        Self {
            preview_limit: Self::DEFAULT_PREVIEW_LIMIT,
        }
    }

    /// Limit how many payload bytes end up in the log line.
    #[must_use]
    pub fn with_preview_limit(mut self, limit: usize) -> Self {
        self.preview_limit = limit;
        self
    }

    fn preview<'a>(&self, payload: Option<&'a Bytes>) -> std::borrow::Cow<'a, str> {
        match payload {
            Some(bytes) => {
                let end = bytes.len().min(self.preview_limit);
                String::from_utf8_lossy(&bytes[..end])
            }
            None => std::borrow::Cow::Borrowed(""),
        }
    }
}

impl Default for LogTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracer for LogTracer {
    fn trace(&self, event: &TraceEvent) -> Result<(), BoxError> {
        let payload_len = event.payload.as_ref().map_or(0, Bytes::len);
        tracing::trace!(
            target: TRACE_TARGET,
            direction = %event.direction,
            method = %event.method,
            uri = %event.uri,
            status = event.status.map(|s| s.as_u16()),
            payload_len,
            error = event.error.as_deref(),
            payload = %self.preview(event.payload.as_ref()),
            "http exchange"
        );
        Ok(())
    }
}

/// Hand `event` to `tracer`, swallowing errors and panics.
pub(crate) fn emit(tracer: &dyn Tracer, event: &TraceEvent) {
    match panic::catch_unwind(AssertUnwindSafe(|| tracer.trace(event))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(
                error = %e,
                direction = %event.direction,
                uri = %event.uri,
                "Tracer failed; event dropped"
            );
        }
        Err(_) => {
            tracing::warn!(
                direction = %event.direction,
                uri = %event.uri,
                "Tracer panicked; event dropped"
            );
        }
    }
}
