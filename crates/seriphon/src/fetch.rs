//! HTTP access behind a trait seam.
//!
//! The crawler and the download engine only ever talk to the network through
//! [`PageFetcher`], so tests can substitute an in-memory implementation and
//! the reqwest client stays in one place.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use crate::config::{EngineConfig, create_client};
use crate::error::{EngineError, Result};
use crate::utils::format_bytes;

/// Type alias for a boxed stream of raw response bytes
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// The two HTTP operations the engine needs: fetching a directory page as
/// text, and opening a media URL as a chunked byte stream.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a directory-like page and return its body as text.
    async fn fetch_page(&self, url: &Url) -> Result<String>;

    /// Open a media URL for streaming. The transfer itself happens as the
    /// returned stream is consumed.
    async fn open_stream(&self, url: &Url) -> Result<ByteStream>;
}

/// reqwest-backed [`PageFetcher`].
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a new fetcher with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(&EngineConfig::default())
    }

    /// Create a new fetcher with custom configuration
    pub fn with_config(config: &EngineConfig) -> Result<Self> {
        let client = create_client(config)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_page(&self, url: &Url) -> Result<String> {
        debug!(url = %url, "Fetching page");

        let response = self.client.get(url.clone()).send().await?;

        if !response.status().is_success() {
            return Err(EngineError::http_status(
                response.status(),
                url.as_str(),
                "page fetch",
            ));
        }

        Ok(response.text().await?)
    }

    async fn open_stream(&self, url: &Url) -> Result<ByteStream> {
        info!(url = %url, "Starting download");

        let response = self.client.get(url.clone()).send().await?;

        if !response.status().is_success() {
            return Err(EngineError::http_status(
                response.status(),
                url.as_str(),
                "media download",
            ));
        }

        if let Some(content_length) = response.content_length() {
            info!(
                url = %url,
                size = %format_bytes(content_length),
                "Download size information available"
            );
        } else {
            debug!(url = %url, "Content length not available");
        }

        let raw_stream = response
            .bytes_stream()
            .map(|result| result.map_err(std::io::Error::other))
            .boxed();

        Ok(raw_stream)
    }
}
