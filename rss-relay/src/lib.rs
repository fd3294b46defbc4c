pub mod types;
pub mod config;
pub mod fetcher;
pub mod parser;
pub mod sources;
pub mod seen_store;
pub mod filter;
pub mod message;
pub mod transport;
pub mod poller;
pub mod scheduler;

pub use types::*;
pub use fetcher::Fetcher;
pub use parser::FeedParser;
pub use sources::RssFeedSource;
pub use seen_store::{SeenDb, SeenPartition};
pub use filter::{decide, Decision};
pub use transport::TelegramTransport;
pub use poller::{FeedPoller, PollReport};
pub use scheduler::{RunMode, Scheduler, ShutdownHandle, TaskSummary};
