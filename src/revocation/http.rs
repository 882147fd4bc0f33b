//! HTTP abstraction for CRL retrieval.

use async_trait::async_trait;

/// Response to a CRL download request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the status code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport used to download revocation data.
///
/// CRL retrieval is a plain GET of a DER body; implementations should
/// apply their own timeouts. The response Content-Type is deliberately not
/// inspected, since CA endpoints are inconsistent about it; the DER parser
/// is the arbiter of validity.
#[async_trait]
pub trait HttpClient: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn fetch(&self, url: &str) -> Result<HttpResponse, Self::Error>;
}

#[derive(Debug, thiserror::Error)]
#[error("no HTTP client configured")]
pub struct NoHttpClientError;

/// `()` is the disabled transport: every fetch fails. Useful for
/// cache-only deployments where entries are seeded through
/// [`CrlCache::put`](super::CrlCache::put).
#[async_trait]
impl HttpClient for () {
    type Error = NoHttpClientError;

    async fn fetch(&self, _url: &str) -> Result<HttpResponse, Self::Error> {
        Err(NoHttpClientError)
    }
}
