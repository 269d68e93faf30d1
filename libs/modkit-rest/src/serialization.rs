//! Pluggable body serialization.
//!
//! The client never touches a wire format directly: request bodies are turned
//! into bytes and response payloads back into values through a
//! [`SerializationAdapter`]. Headers are passed along so an adapter can pick a
//! format variant (charset, versioned media type) per message.

use crate::error::BoxError;
use http::HeaderMap;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Converts typed bodies to bytes and back.
pub trait SerializationAdapter: Send + Sync + 'static {
    /// Serialize a request body.
    ///
    /// # Errors
    /// Returns the format-specific error if the value cannot be encoded.
    fn serialize<T>(&self, value: &T, headers: &HeaderMap) -> Result<Vec<u8>, BoxError>
    where
        T: Serialize + ?Sized;

    /// Deserialize a response payload.
    ///
    /// # Errors
    /// Returns the format-specific error if the bytes do not decode into `T`.
    fn deserialize<T>(&self, bytes: &[u8], headers: &HeaderMap) -> Result<T, BoxError>
    where
        T: DeserializeOwned;

    /// `Content-Type` applied to serialized request bodies that have none.
    fn content_type(&self) -> &'static str;
}

/// JSON via `serde_json`.
///
/// An empty (or whitespace-only) payload deserializes as JSON `null`, so `()`
/// and `Option<T>` targets work for `204 No Content` responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAdapter;

impl SerializationAdapter for JsonAdapter {
    fn serialize<T>(&self, value: &T, _headers: &HeaderMap) -> Result<Vec<u8>, BoxError>
    where
        T: Serialize + ?Sized,
    {
        Ok(serde_json::to_vec(value)?)
    }

    fn deserialize<T>(&self, bytes: &[u8], _headers: &HeaderMap) -> Result<T, BoxError>
    where
        T: DeserializeOwned,
    {
        let bytes = if bytes.trim_ascii().is_empty() {
            b"null".as_slice()
        } else {
            bytes
        };
        Ok(serde_json::from_slice(bytes)?)
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }
}

/// Compact binary encoding via `postcard`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostcardAdapter;

impl SerializationAdapter for PostcardAdapter {
    fn serialize<T>(&self, value: &T, _headers: &HeaderMap) -> Result<Vec<u8>, BoxError>
    where
        T: Serialize + ?Sized,
    {
        Ok(postcard::to_allocvec(value)?)
    }

    fn deserialize<T>(&self, bytes: &[u8], _headers: &HeaderMap) -> Result<T, BoxError>
    where
        T: DeserializeOwned,
    {
        Ok(postcard::from_bytes(bytes)?)
    }

    fn content_type(&self) -> &'static str {
        "application/x-postcard"
    }
}
