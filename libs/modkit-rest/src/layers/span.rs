use http::{Request, Response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;

/// Tower layer that runs every outbound request inside an `outgoing_http` span.
///
/// The span carries the logical client name, the method and the URL without
/// its query string. Status code and error flag are recorded once the
/// response (or failure) arrives.
#[derive(Clone)]
pub struct SpanLayer {
    client: Arc<str>,
}

impl SpanLayer {
    #[must_use]
    pub fn new(client: &str) -> Self {
        Self {
            client: Arc::from(client),
        }
    }
}

impl<S> Layer<S> for SpanLayer {
    type Service = SpanService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SpanService {
            inner,
            client: Arc::clone(&self.client),
        }
    }
}

#[derive(Clone)]
pub struct SpanService<S> {
    inner: S,
    client: Arc<str>,
}

/// URL without query string or fragment.
fn sanitized_url(uri: &http::Uri) -> String {
    format!(
        "{}://{}{}",
        uri.scheme_str().unwrap_or("https"),
        uri.authority().map_or("", http::uri::Authority::as_str),
        uri.path()
    )
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for SpanService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let span = tracing::info_span!(
            "outgoing_http",
            rest.client = %self.client,
            http.method = %req.method(),
            http.url = %sanitized_url(req.uri()),
            http.status_code = tracing::field::Empty,
            error = tracing::field::Empty,
        );

        // Call the instance that was polled ready, keep a fresh clone for the next cycle.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let result = inner.call(req).instrument(span.clone()).await;
            match &result {
                Ok(response) => {
                    let status = response.status();
                    span.record("http.status_code", status.as_u16());
                    if status.is_client_error() || status.is_server_error() {
                        span.record("error", true);
                    }
                }
                Err(_) => {
                    span.record("error", true);
                }
            }
            result
        })
    }
}
