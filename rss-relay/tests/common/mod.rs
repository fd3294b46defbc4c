#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rss_relay::{Destination, Entry, FeedConfig, FeedSource, SeenStore, SendOutcome, Transport};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap()
}

pub fn cutoff() -> DateTime<Utc> {
    at(2024, 1, 1, 0, 0)
}

pub fn entry(link: &str, published: DateTime<Utc>) -> Entry {
    Entry {
        link: link.to_string(),
        title: format!("Title of {}", link),
        published,
        categories: Vec::new(),
    }
}

pub fn entry_in(link: &str, published: DateTime<Utc>, category: &str) -> Entry {
    Entry {
        categories: vec![category.to_string()],
        ..entry(link, published)
    }
}

pub fn destination(name: &str, feeds: Vec<FeedConfig>) -> Destination {
    Destination {
        name: name.to_string(),
        id: format!("@{}", name),
        feeds,
    }
}

/// Feed source serving canned entries per URL; unknown URLs fail.
#[derive(Default)]
pub struct StaticSource {
    feeds: HashMap<String, Vec<Entry>>,
    delay: Option<Duration>,
    fetches: Mutex<Vec<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(mut self, url: &str, entries: Vec<Entry>) -> Self {
        self.feeds.insert(url.to_string(), entries);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn max_concurrent_fetches(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for StaticSource {
    async fn entries(&self, url: &str) -> Result<Vec<Entry>> {
        self.fetches.lock().unwrap().push(url.to_string());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        self.feeds
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("connection refused: {}", url))
    }
}

/// Transport that records every message and fails on request.
#[derive(Default)]
pub struct RecordingTransport {
    outcomes: HashMap<String, SendOutcome>,
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Any message mentioning `link` gets `outcome` instead of `Delivered`.
    pub fn with_outcome(mut self, link: &str, outcome: SendOutcome) -> Self {
        self.outcomes.insert(link.to_string(), outcome);
        self
    }

    pub fn attempts(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempted_links(&self) -> Vec<String> {
        self.attempts()
            .iter()
            .filter_map(|(_, text)| text.lines().nth(1).map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, destination_id: &str, text: &str) -> SendOutcome {
        self.sent
            .lock()
            .unwrap()
            .push((destination_id.to_string(), text.to_string()));

        self.outcomes
            .iter()
            .find(|(link, _)| text.lines().nth(1) == Some(link.as_str()))
            .map(|(_, outcome)| outcome.clone())
            .unwrap_or(SendOutcome::Delivered)
    }
}

/// Seen store whose reads and/or writes always fail.
pub struct BrokenStore {
    pub fail_reads: bool,
    pub fail_writes: bool,
}

#[async_trait]
impl SeenStore for BrokenStore {
    fn key(&self) -> &str {
        "broken"
    }

    async fn has(&self, _link: &str) -> Result<bool> {
        if self.fail_reads {
            Err(anyhow!("database is locked"))
        } else {
            Ok(false)
        }
    }

    async fn record(&self, _link: &str) -> Result<()> {
        if self.fail_writes {
            Err(anyhow!("disk I/O error"))
        } else {
            Ok(())
        }
    }
}
