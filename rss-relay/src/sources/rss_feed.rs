use crate::types::{Entry, FeedSource, FetchConfig, Result};
use crate::{FeedParser, Fetcher};
use async_trait::async_trait;
use tracing::info;

/// Feed source that pulls documents over HTTP and parses them as RSS or Atom.
pub struct RssFeedSource {
    fetcher: Fetcher,
    parser: FeedParser,
}

impl RssFeedSource {
    pub fn new(fetch_config: FetchConfig) -> Result<Self> {
        Ok(Self {
            fetcher: Fetcher::new(fetch_config)?,
            parser: FeedParser::new(),
        })
    }

    pub async fn pull(&self, url: &str) -> Result<Vec<Entry>> {
        let content = self.fetcher.fetch_feed(url).await?;
        let entries = self.parser.parse_feed(&content)?;
        info!("Pulled {} entries from {}", entries.len(), url);
        Ok(entries)
    }
}

#[async_trait]
impl FeedSource for RssFeedSource {
    async fn entries(&self, url: &str) -> anyhow::Result<Vec<Entry>> {
        Ok(self.pull(url).await?)
    }
}
