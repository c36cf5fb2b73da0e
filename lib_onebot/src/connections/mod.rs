//! # Connections Module
//!
//! Persistence behind the permission resolver and the API cache.

/// Async Redis cache shared by the admin mirror and the API facade.
pub mod cache_redis;

/// Admin set persisted to `admin.json`, optionally mirrored to Redis.
pub mod admin_store;

/// Per-user permission table persisted to `permissions.json`.
pub mod level_store;

// --- Re-exports ---
pub use admin_store::AdminManager;
pub use cache_redis::RedisCache;
pub use level_store::JsonLevelStore;
