//! # Redis Cache Implementation
//!
//! Async wrapper over a Redis [`ConnectionManager`], which reconnects by
//! itself and is cheap to clone.

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisResult};

/// A handler for Redis cache interactions.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache").finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Connects to the given URL (e.g. `redis://127.0.0.1/`).
    pub async fn connect(url: &str) -> RedisResult<Self> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    pub async fn get(&self, key: &str) -> RedisResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await
    }

    /// Stores a string value that expires after `seconds`.
    pub async fn set_ex(&self, key: &str, value: &str, seconds: u64) -> RedisResult<()> {
        let mut conn = self.conn.clone();
        conn.set_ex(key, value, seconds).await
    }

    pub async fn del(&self, key: &str) -> RedisResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(key).await?;
        Ok(())
    }

    pub async fn sismember(&self, key: &str, member: i64) -> RedisResult<bool> {
        let mut conn = self.conn.clone();
        conn.sismember(key, member).await
    }

    pub async fn sadd(&self, key: &str, members: &[i64]) -> RedisResult<()> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: i64 = conn.sadd(key, members).await?;
        Ok(())
    }

    pub async fn srem(&self, key: &str, member: i64) -> RedisResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.srem(key, member).await?;
        Ok(())
    }
}
