use crate::filter::{decide, Decision};
use crate::message::format_entry;
use crate::types::{
    Destination, Entry, FeedConfig, FeedSource, PollPolicy, SeenStore, SendOutcome, Transport,
};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Counters for one pass over a destination's feeds.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub feeds_polled: usize,
    pub feeds_disabled: usize,
    pub feed_errors: usize,
    pub sent: usize,
    pub send_failures: usize,
    pub ignored: usize,
    pub already_seen: usize,
    pub too_old: usize,
    pub persistence_errors: usize,
}

impl PollReport {
    pub fn absorb(&mut self, other: &PollReport) {
        self.feeds_polled += other.feeds_polled;
        self.feeds_disabled += other.feeds_disabled;
        self.feed_errors += other.feed_errors;
        self.sent += other.sent;
        self.send_failures += other.send_failures;
        self.ignored += other.ignored;
        self.already_seen += other.already_seen;
        self.too_old += other.too_old;
        self.persistence_errors += other.persistence_errors;
    }
}

/// Fetches a destination's feeds, filters their entries and delivers the new
/// ones. Failures are logged and counted; a poll never fails as a whole.
pub struct FeedPoller {
    source: Arc<dyn FeedSource>,
    transport: Arc<dyn Transport>,
    policy: PollPolicy,
}

impl FeedPoller {
    pub fn new(
        source: Arc<dyn FeedSource>,
        transport: Arc<dyn Transport>,
        policy: PollPolicy,
    ) -> Self {
        Self {
            source,
            transport,
            policy,
        }
    }

    pub async fn poll(&self, destination: &Destination, seen: &dyn SeenStore) -> PollReport {
        debug!("Polling chat '{}' ({})", destination.name, destination.id);
        let mut report = PollReport::default();

        for feed in &destination.feeds {
            if feed.disabled {
                debug!("Skipping '{}' since it is disabled", feed.name);
                report.feeds_disabled += 1;
                continue;
            }

            let entries = match self.source.entries(&feed.url).await {
                Ok(entries) => entries,
                Err(e) => {
                    error!(
                        "Failed to read feed '{}' at {} for chat '{}': {:#}",
                        feed.name, feed.url, destination.name, e
                    );
                    report.feed_errors += 1;
                    continue;
                }
            };

            report.feeds_polled += 1;
            self.process_feed(destination, feed, entries, seen, &mut report)
                .await;
        }

        info!(
            "Polled chat '{}': {} sent, {} failed sends, {} ignored, {} feed errors, {} store errors",
            destination.name,
            report.sent,
            report.send_failures,
            report.ignored,
            report.feed_errors,
            report.persistence_errors
        );
        report
    }

    async fn process_feed(
        &self,
        destination: &Destination,
        feed: &FeedConfig,
        entries: Vec<Entry>,
        seen: &dyn SeenStore,
        report: &mut PollReport,
    ) {
        for entry in entries {
            let already_seen = match seen.has(&entry.link).await {
                Ok(found) => found,
                Err(e) => {
                    // Never send without a seen check
                    error!(
                        "Seen lookup failed for chat '{}', abandoning feed '{}' this cycle: {} | {:#}",
                        seen.key(),
                        feed.name,
                        entry.link,
                        e
                    );
                    report.persistence_errors += 1;
                    return;
                }
            };

            let decision = decide(&entry, feed, |_| already_seen, self.policy.cutoff);
            match decision {
                Decision::SkipCategory => {
                    info!(
                        "Ignored because category = {:?}: {} | {} | {}",
                        entry.categories, feed.name, entry.published, entry.link
                    );
                    report.ignored += 1;
                    self.mark_seen(seen, feed, &entry, report).await;
                }
                Decision::SkipSeen | Decision::SkipAge => {
                    if decision == Decision::SkipSeen {
                        report.already_seen += 1;
                    } else {
                        report.too_old += 1;
                    }
                    if decision.stops_scan(feed.scan_order) {
                        debug!(
                            "Stopping scan of '{}' at {:?} entry {}",
                            feed.name, decision, entry.link
                        );
                        break;
                    }
                }
                Decision::Deliver => {
                    self.deliver(destination, feed, &entry, seen, report).await;
                }
            }
        }
    }

    async fn deliver(
        &self,
        destination: &Destination,
        feed: &FeedConfig,
        entry: &Entry,
        seen: &dyn SeenStore,
        report: &mut PollReport,
    ) {
        let text = format_entry(entry, &feed.name, &self.policy.display_offset);

        match self.transport.send(&destination.id, &text).await {
            SendOutcome::Delivered => {
                info!(
                    "Sent to chat '{}': {} | {} | {}",
                    destination.name, feed.name, entry.published, entry.link
                );
                report.sent += 1;
                // Only a confirmed delivery may be marked seen
                self.mark_seen(seen, feed, entry, report).await;
            }
            SendOutcome::TimedOut => {
                error!(
                    "Timeout when attempting to send to chat '{}': {} | {} | {}",
                    destination.name, feed.name, entry.published, entry.link
                );
                report.send_failures += 1;
            }
            SendOutcome::Failed(reason) => {
                error!(
                    "Failed to send to chat '{}': {} | {} | {}: {}",
                    destination.name, feed.name, entry.published, entry.link, reason
                );
                report.send_failures += 1;
            }
        }
    }

    async fn mark_seen(
        &self,
        seen: &dyn SeenStore,
        feed: &FeedConfig,
        entry: &Entry,
        report: &mut PollReport,
    ) {
        if let Err(e) = seen.record(&entry.link).await {
            error!(
                "Seen store write failed for chat '{}', entry may be delivered again: {} | {} | {:#}",
                seen.key(),
                feed.name,
                entry.link,
                e
            );
            report.persistence_errors += 1;
        }
    }
}
