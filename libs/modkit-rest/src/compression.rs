use crate::error::BoxError;
use bytes::Bytes;
use http::HeaderMap;
use std::io::Read;

/// Client-side payload decompression keyed by `Content-Encoding`.
pub trait Compressor: Send + Sync {
    /// Encoding token this compressor handles (for example `gzip`)
    fn encoding(&self) -> &str;

    /// Decode a full payload.
    ///
    /// # Errors
    /// Returns an error if the payload is not valid for this encoding or
    /// decodes to more than the compressor allows.
    fn decompress(&self, payload: &[u8]) -> Result<Bytes, BoxError>;
}

/// Whether any `Content-Encoding` token in `headers` equals `encoding`
/// (ASCII case-insensitive, comma-separated lists and repeated headers allowed).
#[must_use]
pub fn content_encoding_matches(headers: &HeaderMap, encoding: &str) -> bool {
    headers
        .get_all(http::header::CONTENT_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case(encoding))
}

/// Gzip decoding with an upper bound on the decoded size.
#[derive(Debug, Clone)]
pub struct GzipCompressor {
    max_decoded_size: usize,
}

impl GzipCompressor {
    /// Default bound on decoded payloads (32 MB)
    pub const DEFAULT_MAX_DECODED_SIZE: usize = 32 * 1024 * 1024;

    #[must_use]
    pub fn new() -> Self {
        Self {
            max_decoded_size: Self::DEFAULT_MAX_DECODED_SIZE,
        }
    }

    /// Bound the decoded size; larger payloads fail instead of being truncated.
    #[must_use]
    pub fn with_max_decoded_size(mut self, limit: usize) -> Self {
        self.max_decoded_size = limit;
        self
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for GzipCompressor {
    fn encoding(&self) -> &str {
        "gzip"
    }

    fn decompress(&self, payload: &[u8]) -> Result<Bytes, BoxError> {
        let limit = u64::try_from(self.max_decoded_size)
            .unwrap_or(u64::MAX)
            .saturating_add(1);
        let mut decoder = flate2::read::GzDecoder::new(payload).take(limit);
        let mut decoded = Vec::new();
        decoder.read_to_end(&mut decoded)?;

        if decoded.len() > self.max_decoded_size {
            return Err(format!(
                "decoded payload exceeds {} bytes",
                self.max_decoded_size
            )
            .into());
        }
        Ok(Bytes::from(decoded))
    }
}
