#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Typed REST client for `ModKit`
//!
//! A thin layer over a tower-based HTTP transport that marshals typed bodies
//! through a pluggable [`SerializationAdapter`], merges default headers,
//! optionally decompresses payloads and traces traffic, and translates every
//! failure into a [`RestError`].
//!
//! # Example
//!
//! ```ignore
//! use modkit_rest::{RestClient, Request, Response};
//!
//! let client = RestClient::builder()
//!     .name("orders")
//!     .base_uri("https://orders.example.com/api/v1/")
//!     .default_header("accept", "application/json")
//!     .log_tracing()
//!     .build()?;
//!
//! let order: Response<Order> = client.get("orders/42").await?;
//! let created: Response<Order> = client.post("orders", &new_order).await?;
//! ```
//!
//! # Transports
//!
//! Transports are looked up by client name through a [`TransportFactory`].
//! The default [`CachingTransportFactory`] builds one hyper/rustls transport
//! per name and reuses it; share the factory between builders to share
//! connection pools. Any tower service with the right types can be plugged in
//! through [`RestClientBuilder::transport`].
//!
//! # Errors
//!
//! Cancellation surfaces as [`RestError::Cancelled`]; every other transport
//! failure is wrapped into [`RestError::Send`] together with the request that
//! was sent. Statuses outside the success range become [`RestError::Status`]
//! unless `throw_on_failure` is disabled.

mod builder;
mod client;
mod compression;
mod config;
mod converter;
mod error;
pub mod layers;
mod request;
mod response;
mod serialization;
mod trace;
mod transport;

#[cfg(test)]
mod testing;

pub use builder::RestClientBuilder;
pub use client::RestClient;
pub use compression::{Compressor, GzipCompressor, content_encoding_matches};
pub use config::{
    DEFAULT_CLIENT_NAME, DEFAULT_MAX_BODY_SIZE, DEFAULT_SUCCESS_RANGE, DEFAULT_USER_AGENT,
    HeaderEntry, RedirectConfig, RestClientConfig, TlsRootConfig, TransportConfig,
    TransportSecurity,
};
pub use converter::{
    ConvertContext, DefaultRequestConverter, RequestConverter, body_allowed, merge_headers,
    parse_base_uri, resolve_uri,
};
pub use error::{BoxError, InvalidUriKind, RestError, SentRequest, TransportError};
pub use layers::RedirectPolicy;
pub use request::Request;
pub use response::{RawResponse, Response, ResponseBody};
pub use serialization::{JsonAdapter, PostcardAdapter, SerializationAdapter};
pub use trace::{LogTracer, TRACE_TARGET, TraceDirection, TraceEvent, Tracer};
pub use transport::{
    CachingTransportFactory, SingletonTransportFactory, Transport, TransportConstructor,
    TransportFactory, TransportRequest, boxed_body, build_transport,
};

pub use tokio_util::sync::CancellationToken;
