use crate::types::{FetchConfig, RelayError, Result};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client, config })
    }

    /// GET the feed document at `url` and return its body.
    pub async fn fetch_feed(&self, url: &str) -> Result<String> {
        let start_time = Instant::now();
        debug!("Fetching feed: {}", url);

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(
                url,
                format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ),
            ));
        }

        let limit = self.config.max_feed_size_mb * 1024 * 1024;
        if let Some(content_length) = response.content_length() {
            if content_length as usize > limit {
                return Err(fetch_error(
                    url,
                    format!("feed too large: {} bytes", content_length),
                ));
            }
        }

        // Content-Length may be absent or wrong; cap the bytes actually read
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| fetch_error(url, e.to_string()))?
        {
            if body.len() + chunk.len() > limit {
                return Err(fetch_error(
                    url,
                    format!("feed too large: more than {} bytes", limit),
                ));
            }
            body.extend_from_slice(&chunk);
        }
        let content = String::from_utf8_lossy(&body).into_owned();

        info!(
            "Fetched feed: {} ({} bytes in {}ms)",
            url,
            content.len(),
            start_time.elapsed().as_millis()
        );
        Ok(content)
    }
}

fn fetch_error(url: &str, reason: String) -> RelayError {
    RelayError::Fetch {
        url: url.to_string(),
        reason,
    }
}
