//! # Store Seams
//!
//! The counter and the article-list cache live in the same key-value store but in
//! separate key spaces, see [`crate::database`] for the naming.
//!
//! - [`CounterStore`]: permanent per-article view counters, atomic increment only
//! - [`CacheStore`]: short-lived string entries with a TTL
//!
//! [`MemoryStore`] implements both. It is a test double, never wired into the
//! running server, which always talks to [`crate::database::RedisStore`]. It gives
//! the same guarantee as Redis `INCR`: the add happens under one lock, so no
//! increment is ever lost.
use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::Instant;

use crate::{articles::ArticleId, database::page_view_key, error::StoreError};

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Adds one to the article's counter and returns the new value.
    async fn increment(&self, article_id: ArticleId) -> Result<u64, StoreError>;

    /// Current value, `0` for an article that was never viewed.
    async fn count(&self, article_id: ArticleId) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;

    async fn del(&self, key: &str) -> Result<(), StoreError>;
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

pub struct MemoryStore {
    counters: Mutex<HashMap<String, u64>>,
    entries: Mutex<HashMap<String, CacheEntry>>,
    online: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
            entries: Mutex::new(HashMap::new()),
            online: AtomicBool::new(true),
        }
    }

    /// Overwrites a counter, for seeding fixtures.
    #[cfg(test)]
    pub fn set_count(&self, article_id: ArticleId, count: u64) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters.insert(page_view_key(article_id), count);
    }

    /// While offline every call fails with [`StoreError::Offline`].
    #[cfg(test)]
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Offline)
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn increment(&self, article_id: ArticleId) -> Result<u64, StoreError> {
        self.check_online()?;

        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        let count = counters.entry(page_view_key(article_id)).or_insert(0);
        *count += 1;

        Ok(*count)
    }

    async fn count(&self, article_id: ArticleId) -> Result<u64, StoreError> {
        self.check_online()?;

        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        Ok(counters.get(&page_view_key(article_id)).copied().unwrap_or(0))
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_online()?;

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        self.check_online()?;

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );

        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.check_online()?;

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);

        Ok(())
    }
}
