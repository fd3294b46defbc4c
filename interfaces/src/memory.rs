use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::defs::SeenStore;

/// Non-durable seen partition. Clones share the same set, which lets a test
/// keep a handle while the poller owns another.
#[derive(Clone, Debug, Default)]
pub struct MemorySeenStore {
    key: String,
    links: Arc<RwLock<HashSet<String>>>,
}

impl MemorySeenStore {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            links: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    pub async fn with_links<I, S>(key: impl Into<String>, links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new(key);
        {
            let mut set = store.links.write().await;
            set.extend(links.into_iter().map(Into::into));
        }
        store
    }

    pub async fn len(&self) -> usize {
        self.links.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.links.read().await.is_empty()
    }
}

#[async_trait]
impl SeenStore for MemorySeenStore {
    fn key(&self) -> &str {
        &self.key
    }

    async fn has(&self, link: &str) -> Result<bool> {
        Ok(self.links.read().await.contains(link))
    }

    async fn record(&self, link: &str) -> Result<()> {
        self.links.write().await.insert(link.to_string());
        Ok(())
    }
}
