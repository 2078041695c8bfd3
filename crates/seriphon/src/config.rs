use std::time::Duration;

use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue};

use crate::error::{EngineError, Result};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Configurable options for the crawler and the download engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Overall timeout for a single HTTP request. Zero disables it, which is
    /// the default because media transfers can legitimately run for a long
    /// time.
    pub timeout: Duration,

    /// Connection timeout (time to establish the initial connection)
    pub connect_timeout: Duration,

    /// Capacity of the buffered writer sitting between the network stream and
    /// the destination file
    pub buffer_size: usize,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Custom HTTP headers for requests
    pub headers: HeaderMap,

    /// File extensions treated as terminal media links during the crawl
    /// (lowercase, with the leading dot)
    pub media_extensions: Vec<String>,

    /// Maximum directory depth the tree resolver will descend to. The visited
    /// set already guarantees termination on cyclic listings; this bounds
    /// pathological non-cyclic trees as well.
    pub max_crawl_depth: usize,

    /// Concurrency used when a job does not specify its own
    pub default_parallelism: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(0),
            connect_timeout: Duration::from_secs(30),
            buffer_size: 64 * 1024,
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: EngineConfig::get_default_headers(),
            media_extensions: vec![
                ".mp4".to_owned(),
                ".mkv".to_owned(),
                ".avi".to_owned(),
                ".webm".to_owned(),
            ],
            max_crawl_depth: 8,
            default_parallelism: 2,
        }
    }
}

impl EngineConfig {
    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );

        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5,es;q=0.3"),
        );

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers
    }

    /// Check whether a URL path points at a recognized media file.
    pub fn is_media_path(&self, path: &str) -> bool {
        let path = path.to_ascii_lowercase();
        self.media_extensions.iter().any(|ext| path.ends_with(ext))
    }
}

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &EngineConfig) -> Result<Client> {
    let mut client_builder = Client::builder()
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    client_builder
        .build()
        .map_err(|source| EngineError::Network { source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.buffer_size, 64 * 1024);
        assert_eq!(config.default_parallelism, 2);
        assert!(config.follow_redirects);
    }

    #[test]
    fn test_is_media_path_ignores_case() {
        let config = EngineConfig::default();
        assert!(config.is_media_path("/show/season-1/ep01.MP4"));
        assert!(config.is_media_path("/show/season-1/ep01.mkv"));
        assert!(!config.is_media_path("/show/season-1/"));
        assert!(!config.is_media_path("/show/season-1/notes.txt"));
    }
}
