//! # Admin Manager
//!
//! The admin set lives in memory and in `admin.json`
//! (`{"admins": ["123", ...]}`). When a [`RedisCache`] is attached the set is
//! mirrored under [`ADMIN_REDIS_KEY`] and `is_admin` reads Redis first,
//! falling back to memory when Redis fails.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use log::{debug, error, info, warn};
use serde_json::{json, Value};

use crate::connections::RedisCache;
use crate::core::permission::AdminStore;
use crate::error::StoreError;

pub const ADMIN_REDIS_KEY: &str = "neobot:admins";

pub struct AdminManager {
    path: PathBuf,
    admins: RwLock<HashSet<i64>>,
    redis: Option<RedisCache>,
    // Serializes read-modify-write cycles against the file.
    write_lock: tokio::sync::Mutex<()>,
}

fn parse_admins(contents: &str) -> Result<HashSet<i64>, StoreError> {
    let value: Value = serde_json::from_str(contents)?;
    let ids = value
        .get("admins")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => s.trim().parse().ok(),
                    Value::Number(n) => n.as_i64(),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(ids)
}

fn render_admins(admins: &HashSet<i64>) -> Result<String, StoreError> {
    let mut ids: Vec<i64> = admins.iter().copied().collect();
    ids.sort_unstable();
    let list: Vec<String> = ids.iter().map(i64::to_string).collect();
    Ok(serde_json::to_string_pretty(&json!({ "admins": list }))?)
}

impl AdminManager {
    /// Loads the admin file. A missing file is created empty; a corrupt one
    /// is logged and treated as empty.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let admins = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            match parse_admins(&contents) {
                Ok(set) => set,
                Err(e) => {
                    error!("Failed to parse {}: {}", path.display(), e);
                    HashSet::new()
                }
            }
        } else {
            let empty = HashSet::new();
            write_file(&path, &render_admins(&empty)?)?;
            empty
        };
        debug!("Loaded {} admins from {}", admins.len(), path.display());

        Ok(Self {
            path,
            admins: RwLock::new(admins),
            redis: None,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn with_redis(mut self, cache: RedisCache) -> Self {
        self.redis = Some(cache);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn snapshot(&self) -> HashSet<i64> {
        self.admins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the Redis mirror with the in-memory set.
    pub async fn sync_to_redis(&self) -> Result<(), StoreError> {
        let Some(redis) = &self.redis else {
            return Ok(());
        };
        let ids: Vec<i64> = self.snapshot().into_iter().collect();
        redis.del(ADMIN_REDIS_KEY).await?;
        redis.sadd(ADMIN_REDIS_KEY, &ids).await?;
        debug!("Synced {} admins to Redis", ids.len());
        Ok(())
    }

    async fn persist(&self, admins: &HashSet<i64>) -> Result<(), StoreError> {
        let contents = render_admins(admins)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, contents).await?;
        debug!("Admin list saved to {}", self.path.display());
        Ok(())
    }

    async fn check(&self, user_id: i64) -> bool {
        if let Some(redis) = &self.redis {
            match redis.sismember(ADMIN_REDIS_KEY, user_id).await {
                Ok(found) => return found,
                Err(e) => warn!("Redis admin lookup failed, using memory: {}", e),
            }
        }
        self.admins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&user_id)
    }

    /// Writes `next` to disk, then swaps it in. On error memory is untouched.
    async fn commit(&self, next: HashSet<i64>) -> Result<(), StoreError> {
        self.persist(&next).await?;
        *self.admins.write().unwrap_or_else(PoisonError::into_inner) = next;
        Ok(())
    }

    async fn add(&self, user_id: i64) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut next = self.snapshot();
        if !next.insert(user_id) {
            return Ok(false);
        }
        self.commit(next).await?;
        if let Some(redis) = &self.redis {
            if let Err(e) = redis.sadd(ADMIN_REDIS_KEY, &[user_id]).await {
                error!("Failed to add admin {} to Redis: {}", user_id, e);
            }
        }
        info!("Admin {} added", user_id);
        Ok(true)
    }

    async fn remove(&self, user_id: i64) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut next = self.snapshot();
        if !next.remove(&user_id) {
            return Ok(false);
        }
        self.commit(next).await?;
        if let Some(redis) = &self.redis {
            if let Err(e) = redis.srem(ADMIN_REDIS_KEY, user_id).await {
                error!("Failed to remove admin {} from Redis: {}", user_id, e);
            }
        }
        info!("Admin {} removed", user_id);
        Ok(true)
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}

impl AdminStore for AdminManager {
    fn is_admin(&self, user_id: i64) -> BoxFuture<'_, bool> {
        self.check(user_id).boxed()
    }

    fn add_admin(&self, user_id: i64) -> BoxFuture<'_, Result<bool, StoreError>> {
        self.add(user_id).boxed()
    }

    fn remove_admin(&self, user_id: i64) -> BoxFuture<'_, Result<bool, StoreError>> {
        self.remove(user_id).boxed()
    }

    fn all_admins(&self) -> BoxFuture<'_, Vec<i64>> {
        let ids = self.snapshot().into_iter().collect();
        async move { ids }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_is_created_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("admin.json");
        let manager = AdminManager::load(&path).unwrap();
        assert!(path.exists());
        assert!(manager.all_admins().await.is_empty());
    }

    #[tokio::test]
    async fn test_add_remove_persist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("admin.json");
        let manager = AdminManager::load(&path).unwrap();

        assert!(manager.add_admin(123).await.unwrap());
        assert!(!manager.add_admin(123).await.unwrap());
        assert!(manager.is_admin(123).await);

        let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, json!({"admins": ["123"]}));

        let reloaded = AdminManager::load(&path).unwrap();
        assert!(reloaded.is_admin(123).await);

        assert!(manager.remove_admin(123).await.unwrap());
        assert!(!manager.remove_admin(123).await.unwrap());
        assert!(!manager.is_admin(123).await);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_set() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("admin.json");
        let manager = AdminManager::load(&path).unwrap();
        assert!(manager.add_admin(1).await.unwrap());

        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(manager.add_admin(2).await.is_err());
        assert!(!manager.is_admin(2).await);
        assert!(manager.remove_admin(1).await.is_err());
        assert!(manager.is_admin(1).await);
        assert_eq!(manager.all_admins().await, vec![1]);
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("admin.json");
        std::fs::write(&path, "{not json").unwrap();
        let manager = AdminManager::load(&path).unwrap();
        assert!(manager.all_admins().await.is_empty());
    }

    #[tokio::test]
    async fn test_numeric_ids_accepted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("admin.json");
        std::fs::write(&path, r#"{"admins": [1, "2", "x"]}"#).unwrap();
        let manager = AdminManager::load(&path).unwrap();
        let mut all = manager.all_admins().await;
        all.sort_unstable();
        assert_eq!(all, vec![1, 2]);
    }
}
