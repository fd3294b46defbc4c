//! Per-entry delivery decision.
//!
//! Entries are evaluated in the order the feed lists them. For feeds with
//! `ScanOrder::NewestFirst` the poller ends the scan at the first `SkipSeen`
//! or `SkipAge`: everything after it is older, so it was either handled on an
//! earlier poll or predates the cutoff. A feed that backfills out of order
//! will under-deliver under that assumption; configure it as
//! `ScanOrder::Unordered` to examine every entry instead.

use crate::types::{CategoryMatch, Entry, FeedConfig, ScanOrder};
use chrono::{DateTime, Utc};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Deliver,
    SkipSeen,
    SkipCategory,
    SkipAge,
}

impl Decision {
    /// Whether the rest of the feed should be left unscanned.
    pub fn stops_scan(self, order: ScanOrder) -> bool {
        match order {
            ScanOrder::NewestFirst => matches!(self, Decision::SkipSeen | Decision::SkipAge),
            ScanOrder::Unordered => false,
        }
    }
}

pub fn decide<F>(entry: &Entry, feed: &FeedConfig, is_seen: F, cutoff: DateTime<Utc>) -> Decision
where
    F: FnOnce(&str) -> bool,
{
    if is_seen(&entry.link) {
        return Decision::SkipSeen;
    }

    if category_matches(&feed.ignored_categories, &entry.categories, feed.category_match) {
        return Decision::SkipCategory;
    }

    if entry.published < cutoff {
        return Decision::SkipAge;
    }

    Decision::Deliver
}

/// True if any ignored string matches any of the entry's categories.
pub fn category_matches(ignored: &[String], categories: &[String], mode: CategoryMatch) -> bool {
    ignored.iter().any(|wanted| {
        categories.iter().any(|category| match mode {
            CategoryMatch::Substring => category.contains(wanted.as_str()),
            CategoryMatch::Exact => category == wanted,
        })
    })
}
