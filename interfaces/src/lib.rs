pub mod defs;
pub mod memory;

pub use defs::{
    CategoryMatch, Destination, Entry, FeedConfig, FeedSource, ScanOrder, SeenStore, SendOutcome,
    Transport,
};
pub use memory::MemorySeenStore;
