use crate::types::{Destination, FeedConfig, RelayError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use url::Url;

/// Top-level layout of the feeds file.
#[derive(Debug, Deserialize)]
pub struct FeedsFile {
    pub chats: Vec<ChatConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ChatConfig {
    pub chat_name: String,
    pub chat_id: ChatId,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

/// Telegram accepts both numeric chat ids and `@channel` names, and YAML
/// authors write either.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ChatId {
    Numeric(i64),
    Name(String),
}

impl ChatId {
    pub fn into_address(self) -> String {
        match self {
            ChatId::Numeric(id) => id.to_string(),
            ChatId::Name(name) => name.trim().to_string(),
        }
    }
}

/// Read and validate the feeds file at `path`.
pub fn load_destinations(path: &Path) -> Result<Vec<Destination>> {
    let content = fs::read_to_string(path).map_err(|e| {
        RelayError::Config(format!("reading feeds file {}: {}", path.display(), e))
    })?;
    let destinations = parse_destinations(&content)?;

    info!(
        "Loaded {} chats with {} feeds from {}",
        destinations.len(),
        destinations.iter().map(|d| d.feeds.len()).sum::<usize>(),
        path.display()
    );
    Ok(destinations)
}

pub fn parse_destinations(content: &str) -> Result<Vec<Destination>> {
    let file: FeedsFile = serde_yaml::from_str(content)?;

    if file.chats.is_empty() {
        return Err(RelayError::Config("no chats configured".to_string()));
    }

    let mut names = HashSet::new();
    let mut destinations = Vec::with_capacity(file.chats.len());

    for chat in file.chats {
        let name = chat.chat_name.trim().to_string();
        if name.is_empty() {
            return Err(RelayError::Config("chat_name must not be empty".to_string()));
        }
        // chat_name keys the seen partition, so two chats must never share one
        if !names.insert(name.clone()) {
            return Err(RelayError::Config(format!("duplicate chat_name '{}'", name)));
        }

        let id = chat.chat_id.into_address();
        if id.is_empty() {
            return Err(RelayError::Config(format!("chat '{}' has an empty chat_id", name)));
        }

        for feed in &chat.feeds {
            validate_feed(&name, feed)?;
        }
        debug!("Chat '{}' ({}) has {} feeds", name, id, chat.feeds.len());

        destinations.push(Destination {
            name,
            id,
            feeds: chat.feeds,
        });
    }

    Ok(destinations)
}

fn validate_feed(chat_name: &str, feed: &FeedConfig) -> Result<()> {
    if feed.name.trim().is_empty() {
        return Err(RelayError::Config(format!(
            "chat '{}' has a feed without a name",
            chat_name
        )));
    }

    let url = Url::parse(&feed.url).map_err(|e| {
        RelayError::Config(format!(
            "feed '{}' in chat '{}' has an invalid url '{}': {}",
            feed.name, chat_name, feed.url, e
        ))
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(RelayError::Config(format!(
            "feed '{}' in chat '{}' must use http or https, got '{}'",
            feed.name,
            chat_name,
            url.scheme()
        )));
    }

    Ok(())
}
