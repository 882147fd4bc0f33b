use std::time::Duration;

use async_trait::async_trait;

use super::http::{HttpClient, HttpResponse};

/// Default timeout for CRL downloads. Validation latency is bounded by
/// this on a cache miss, so it errs on the short side.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// [`HttpClient`] backed by [`reqwest`].
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Client with the default timeout.
    pub fn new() -> anyhow::Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Client with a caller-chosen timeout, applied to both connect and
    /// overall request time.
    pub fn with_timeout(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    type Error = reqwest::Error;

    async fn fetch(&self, url: &str) -> Result<HttpResponse, Self::Error> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(HttpResponse { status, body })
    }
}
