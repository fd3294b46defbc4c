use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat or channel that receives entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Destination {
    /// Display and log key; also names the seen partition.
    pub name: String,
    /// Opaque transport address, e.g. a Telegram chat id or `@channel`.
    pub id: String,
    pub feeds: Vec<FeedConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub ignored_categories: Vec<String>,
    #[serde(default)]
    pub category_match: CategoryMatch,
    #[serde(default)]
    pub scan_order: ScanOrder,
}

impl FeedConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            disabled: false,
            ignored_categories: Vec::new(),
            category_match: CategoryMatch::default(),
            scan_order: ScanOrder::default(),
        }
    }

    pub fn with_ignored_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_category_match(mut self, category_match: CategoryMatch) -> Self {
        self.category_match = category_match;
        self
    }

    pub fn with_scan_order(mut self, scan_order: ScanOrder) -> Self {
        self.scan_order = scan_order;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

/// How an ignored category string is compared against an entry's categories.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryMatch {
    /// The ignored string occurs anywhere inside a category.
    #[default]
    Substring,
    /// The ignored string equals a category.
    Exact,
}

/// Ordering the poller may assume for a feed's entries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOrder {
    /// Entries arrive newest first, so the first seen or too-old entry ends the scan.
    #[default]
    NewestFirst,
    /// No ordering guarantee; every entry is examined.
    Unordered,
}

/// One syndicated item, rebuilt on every poll. Only `link` is ever persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub link: String,
    pub title: String,
    pub published: DateTime<Utc>,
    pub categories: Vec<String>,
}

/// Result of handing one message to the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    TimedOut,
    Failed(String),
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered)
    }
}

// Collaborators of the polling engine. Implementations must be shareable
// across the per-destination tasks.

#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse the feed at `url`, returning entries in feed order.
    async fn entries(&self, url: &str) -> Result<Vec<Entry>>;
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, destination_id: &str, text: &str) -> SendOutcome;
}

/// One destination's durable set of delivered links.
#[async_trait]
pub trait SeenStore: Send + Sync {
    fn key(&self) -> &str;

    async fn has(&self, link: &str) -> Result<bool>;

    /// Must not return `Ok` until the mark is durable.
    async fn record(&self, link: &str) -> Result<()>;
}
