use crate::poller::{FeedPoller, PollReport};
use crate::seen_store::SeenDb;
use crate::types::{Destination, Result, SeenStore};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// Poll every destination once, immediately.
    Once,
    /// Poll each destination every interval; the first poll comes one
    /// interval after start.
    Every(Duration),
}

/// A destination together with its seen partition.
pub struct DestinationJob {
    pub destination: Destination,
    pub seen: Arc<dyn SeenStore>,
}

/// Open the seen partition of every destination.
pub async fn prepare_jobs(
    db: &SeenDb,
    destinations: Vec<Destination>,
) -> Result<Vec<DestinationJob>> {
    let mut jobs = Vec::with_capacity(destinations.len());
    for destination in destinations {
        let partition = db.partition(&destination.name).await?;
        info!(
            "Chat '{}' has {} seen links",
            destination.name,
            partition.len().await?
        );
        jobs.push(DestinationJob {
            destination,
            seen: Arc::new(partition),
        });
    }
    Ok(jobs)
}

/// What one destination's task did before it finished.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    pub destination: String,
    pub polls: usize,
    pub totals: PollReport,
}

/// Stops all destination tasks from starting another poll.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        // send_replace succeeds even when every task has already exited
        self.tx.send_replace(true);
    }
}

/// One task per destination. A task awaits its poll before waiting for the
/// next tick, so a destination never has two polls in flight.
pub struct Scheduler {
    shutdown: ShutdownHandle,
    tasks: Vec<(String, JoinHandle<TaskSummary>)>,
}

impl Scheduler {
    pub fn start(poller: Arc<FeedPoller>, jobs: Vec<DestinationJob>, mode: RunMode) -> Self {
        let (tx, rx) = watch::channel(false);

        let tasks = jobs
            .into_iter()
            .map(|job| {
                let name = job.destination.name.clone();
                match mode {
                    RunMode::Once => info!("Scheduling one poll of chat '{}'", name),
                    RunMode::Every(period) => info!(
                        "Scheduling chat '{}' every {}s",
                        name,
                        period.as_secs_f64()
                    ),
                }
                let handle =
                    tokio::spawn(run_destination(poller.clone(), job, mode, rx.clone()));
                (name, handle)
            })
            .collect();

        Self {
            shutdown: ShutdownHandle { tx: Arc::new(tx) },
            tasks,
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        info!("Shutdown requested; letting in-flight polls finish");
        self.shutdown.trigger();
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every destination task to finish.
    pub async fn join(self) -> Vec<TaskSummary> {
        let (names, handles): (Vec<String>, Vec<_>) = self.tasks.into_iter().unzip();

        join_all(handles)
            .await
            .into_iter()
            .zip(names)
            .filter_map(|(result, name)| match result {
                Ok(summary) => Some(summary),
                Err(e) => {
                    error!("Task for chat '{}' ended abnormally: {}", name, e);
                    None
                }
            })
            .collect()
    }
}

async fn run_destination(
    poller: Arc<FeedPoller>,
    job: DestinationJob,
    mode: RunMode,
    mut shutdown: watch::Receiver<bool>,
) -> TaskSummary {
    let mut summary = TaskSummary {
        destination: job.destination.name.clone(),
        ..TaskSummary::default()
    };

    match mode {
        RunMode::Once => {
            if !*shutdown.borrow() {
                let report = poller.poll(&job.destination, job.seen.as_ref()).await;
                summary.record(report);
            }
        }
        RunMode::Every(period) => {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = shutdown.changed() => {
                        // Sender gone means the scheduler itself was dropped
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                if *shutdown.borrow() {
                    break;
                }
                let report = poller.poll(&job.destination, job.seen.as_ref()).await;
                summary.record(report);
            }
        }
    }

    debug!(
        "Task for chat '{}' finished after {} polls",
        summary.destination, summary.polls
    );
    summary
}

impl TaskSummary {
    fn record(&mut self, report: PollReport) {
        self.polls += 1;
        self.totals.absorb(&report);
    }
}
