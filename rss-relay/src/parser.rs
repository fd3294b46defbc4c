use crate::types::{Entry, RelayError, Result};
use chrono::Utc;
use feed_rs::parser;
use tracing::debug;

/// Turns RSS/Atom documents into relay entries, keeping the feed's own order.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeedParser;

impl FeedParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_feed(&self, content: &str) -> Result<Vec<Entry>> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::parse(content.as_bytes())
            .map_err(|e| RelayError::Parse(format!("Failed to parse feed: {}", e)))?;

        let total = feed.entries.len();
        let entries: Vec<Entry> = feed
            .entries
            .into_iter()
            .filter_map(|entry| self.parse_entry(entry))
            .collect();

        if entries.len() < total {
            debug!(
                "Dropped {} of {} entries without a link or timestamp",
                total - entries.len(),
                total
            );
        }
        debug!("Parsed feed with {} entries", entries.len());
        Ok(entries)
    }

    fn parse_entry(&self, entry: feed_rs::model::Entry) -> Option<Entry> {
        let link = match select_link(&entry) {
            Some(link) => link,
            None => {
                debug!("Skipping entry {} without a link", entry.id);
                return None;
            }
        };

        // Items that only carry an update time are dated by it
        let published = match entry.published.or(entry.updated) {
            Some(dt) => dt.with_timezone(&Utc),
            None => {
                debug!("Skipping undated entry: {}", link);
                return None;
            }
        };

        let title = entry
            .title
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled".to_string());

        let categories = entry
            .categories
            .into_iter()
            .map(|c| c.term)
            .collect();

        Some(Entry {
            link,
            title,
            published,
            categories,
        })
    }
}

/// The entry's alternate link, else its first non-empty link, else an http(s)
/// id such as an RSS permalink guid.
fn select_link(entry: &feed_rs::model::Entry) -> Option<String> {
    let hrefs = entry
        .links
        .iter()
        .map(|link| (link.href.trim(), link.rel.as_deref().unwrap_or("")))
        .filter(|(href, _)| !href.is_empty());

    let alternate = hrefs
        .clone()
        .find(|(_, rel)| rel.is_empty() || rel.eq_ignore_ascii_case("alternate"));
    if let Some((href, _)) = alternate.or_else(|| hrefs.clone().next()) {
        return Some(href.to_string());
    }

    let id = entry.id.trim();
    if id.starts_with("http://") || id.starts_with("https://") {
        return Some(id.to_string());
    }
    None
}
