//! # Redis
//!
//! RAM database.
//!
//! Core purpose is to hold the per-article page view counters and the short-lived articles list cache.
//! Counters rely on `INCR`, Redis queues commands so concurrent increments are never lost.
//!
//! ## Keys
//!
//! - `pageviews:article<id>`: page view counter, plain integer, **no TTL**, created by the first `INCR`
//! - `articles:all`: JSON array of article listings, **60s TTL**, deleted on article create/update/delete
//!
//! The `pageviews:` prefix keeps counters out of every other key space, so a cache flush
//! on `articles:*` never touches a counter.
//!
//! ## Requirements
//!
//! - Atomic increments, no read-modify-write on our side
//! - One connection manager per process, cloned into every request
//! - Missing counter reads as 0
use std::time::Duration;

use async_trait::async_trait;
use redis::{
    AsyncCommands, Client, RedisError,
    aio::{ConnectionManager, ConnectionManagerConfig},
};

use crate::{
    articles::ArticleId,
    error::StoreError,
    store::{CacheStore, CounterStore},
};

pub const ARTICLES_KEY: &str = "articles:all";
pub const ARTICLES_TTL: Duration = Duration::from_secs(60);

pub fn page_view_key(article_id: ArticleId) -> String {
    format!("pageviews:article{article_id}")
}

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, RedisError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url)?;
    let connection_manager = client.get_connection_manager_with_config(config).await?;

    Ok(connection_manager)
}

#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn increment(&self, article_id: ArticleId) -> Result<u64, StoreError> {
        let mut connection = self.connection.clone();
        let count: u64 = connection.incr(page_view_key(article_id), 1).await?;

        Ok(count)
    }

    async fn count(&self, article_id: ArticleId) -> Result<u64, StoreError> {
        let mut connection = self.connection.clone();
        let count: Option<u64> = connection.get(page_view_key(article_id)).await?;

        Ok(count.unwrap_or(0))
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut connection = self.connection.clone();

        Ok(connection.get(key).await?)
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let _: () = connection.set_ex(key, value, ttl.as_secs()).await?;

        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let _: () = connection.del(key).await?;

        Ok(())
    }
}
