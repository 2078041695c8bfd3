//! In-memory [`PageFetcher`] used by the crawler and engine tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use url::Url;

use crate::error::{EngineError, Result};
use crate::fetch::{ByteStream, PageFetcher};

enum FileScript {
    Bytes(Vec<u8>),
    Status(StatusCode),
}

/// Scripted fetcher: a page map, a file map with optional failure injection,
/// and a gauge recording the highest number of simultaneously open streams.
pub(crate) struct FakeFetcher {
    pages: HashMap<String, String>,
    files: HashMap<String, FileScript>,
    stream_delay: Duration,
    active_streams: Arc<AtomicUsize>,
    max_active_streams: Arc<AtomicUsize>,
}

impl FakeFetcher {
    pub(crate) fn new() -> Self {
        Self {
            pages: HashMap::new(),
            files: HashMap::new(),
            stream_delay: Duration::ZERO,
            active_streams: Arc::new(AtomicUsize::new(0)),
            max_active_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn with_page(mut self, url: &str, body: String) -> Self {
        self.pages.insert(url.to_string(), body);
        self
    }

    pub(crate) fn with_file(mut self, url: &str, data: Vec<u8>) -> Self {
        self.files.insert(url.to_string(), FileScript::Bytes(data));
        self
    }

    pub(crate) fn with_failure(mut self, url: &str, status: StatusCode) -> Self {
        self.files.insert(url.to_string(), FileScript::Status(status));
        self
    }

    /// Hold each opened stream for this long before handing it back, so
    /// concurrent transfers actually overlap.
    pub(crate) fn with_stream_delay(mut self, delay: Duration) -> Self {
        self.stream_delay = delay;
        self
    }

    /// Counter handle that survives moving the fetcher into an engine.
    pub(crate) fn max_active_handle(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.max_active_streams)
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch_page(&self, url: &Url) -> Result<String> {
        match self.pages.get(url.as_str()) {
            Some(body) => Ok(body.clone()),
            None => Err(EngineError::http_status(
                StatusCode::NOT_FOUND,
                url.as_str(),
                "page fetch",
            )),
        }
    }

    async fn open_stream(&self, url: &Url) -> Result<ByteStream> {
        match self.files.get(url.as_str()) {
            None => Err(EngineError::http_status(
                StatusCode::NOT_FOUND,
                url.as_str(),
                "media download",
            )),
            Some(FileScript::Status(status)) => Err(EngineError::http_status(
                *status,
                url.as_str(),
                "media download",
            )),
            Some(FileScript::Bytes(data)) => {
                let active = self.active_streams.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_active_streams.fetch_max(active, Ordering::SeqCst);
                if !self.stream_delay.is_zero() {
                    tokio::time::sleep(self.stream_delay).await;
                }
                self.active_streams.fetch_sub(1, Ordering::SeqCst);

                let chunks: Vec<std::io::Result<Bytes>> = data
                    .chunks(4)
                    .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
                    .collect();
                Ok(futures::stream::iter(chunks).boxed())
            }
        }
    }
}
