use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
// Use the interfaces crate for the shared data model
pub use interfaces::defs::{
    CategoryMatch, Destination, Entry, FeedConfig, FeedSource, ScanOrder, SeenStore, SendOutcome,
    Transport,
};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_feed_size_mb: usize,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "rss-relay/0.1".to_string(),
            timeout_seconds: 30,
            max_feed_size_mb: 10,
            max_redirects: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SendConfig {
    pub api_base: String,
    pub timeout_seconds: u64,
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            timeout_seconds: 10,
        }
    }
}

/// Process-wide delivery policy shared by every destination's poller.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    /// Nothing published strictly before this instant is delivered.
    pub cutoff: DateTime<Utc>,
    /// Offset used when rendering published times into messages.
    pub display_offset: FixedOffset,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            cutoff: default_cutoff(),
            display_offset: default_display_offset(),
        }
    }
}

pub fn default_display_offset() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).unwrap_or_else(|| Utc.fix())
}

/// 2019-03-20 14:30 at UTC+08:00.
pub fn default_cutoff() -> DateTime<Utc> {
    default_display_offset()
        .with_ymd_and_hms(2019, 3, 20, 14, 30, 0)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Fetch error for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Seen store error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
