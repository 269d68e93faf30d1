//! In-memory transports for unit tests.

use crate::error::TransportError;
use crate::response::ResponseBody;
use crate::transport::{Transport, TransportRequest, boxed_body};
use bytes::Bytes;
use http::Response;
use http_body_util::Full;
use std::future::Future;
use tower::util::BoxCloneSyncService;

/// Transport answering every request with `handler`.
pub(crate) fn transport_fn<F, Fut>(handler: F) -> Transport
where
    F: Fn(TransportRequest) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Response<ResponseBody>, TransportError>> + Send + 'static,
{
    BoxCloneSyncService::new(tower::service_fn(handler))
}

/// Response with the given status, headers and body.
pub(crate) fn text_response(
    status: u16,
    headers: &[(&'static str, &'static str)],
    body: impl Into<Bytes>,
) -> Response<ResponseBody> {
    let mut builder = Response::builder().status(status);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    boxed_body(builder.body(Full::new(body.into())).unwrap())
}

/// Transport answering `200 OK` with an empty body.
pub(crate) fn ok_transport() -> Transport {
    transport_fn(|_req| async { Ok(text_response(200, &[], Bytes::new())) })
}
