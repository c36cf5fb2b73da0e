//! # Permission Resolver
//!
//! Resolves an account id to a [`PermissionLevel`]. The admin set is consulted
//! first and always wins; then the persisted level table; then `User`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use log::info;

use crate::error::{PermissionError, StoreError};

/// Totally ordered permission tiers. Comparison is by ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PermissionLevel {
    User = 1,
    Op = 2,
    Admin = 3,
}

impl PermissionLevel {
    pub fn name(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Op => "op",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PermissionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "op" => Ok(Self::Op),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown permission level: {other}")),
        }
    }
}

/// The externally maintained admin set.
pub trait AdminStore: Send + Sync {
    fn is_admin(&self, user_id: i64) -> BoxFuture<'_, bool>;

    /// Returns `false` when the account already was an admin.
    fn add_admin(&self, user_id: i64) -> BoxFuture<'_, Result<bool, StoreError>>;

    /// Returns `false` when the account was not an admin.
    fn remove_admin(&self, user_id: i64) -> BoxFuture<'_, Result<bool, StoreError>>;

    fn all_admins(&self) -> BoxFuture<'_, Vec<i64>>;
}

/// The persisted per-account level table. Writes must reach storage before
/// returning `Ok`.
pub trait LevelStore: Send + Sync {
    /// `None` when absent or unrecognized.
    fn get(&self, user_id: i64) -> Option<PermissionLevel>;
    fn set(&self, user_id: i64, level: PermissionLevel) -> Result<(), StoreError>;
    fn remove(&self, user_id: i64) -> Result<bool, StoreError>;
    fn all(&self) -> BTreeMap<i64, PermissionLevel>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// Explicit context object shared by the dispatcher and admin plugins.
#[derive(Clone)]
pub struct PermissionResolver {
    admins: Arc<dyn AdminStore>,
    levels: Arc<dyn LevelStore>,
}

impl PermissionResolver {
    pub fn new(admins: Arc<dyn AdminStore>, levels: Arc<dyn LevelStore>) -> Self {
        Self { admins, levels }
    }

    pub async fn effective_level(&self, user_id: i64) -> PermissionLevel {
        if self.admins.is_admin(user_id).await {
            return PermissionLevel::Admin;
        }
        self.levels.get(user_id).unwrap_or(PermissionLevel::User)
    }

    pub async fn check(&self, user_id: i64, required: PermissionLevel) -> bool {
        self.effective_level(user_id).await >= required
    }

    /// Persists a table level. Members of the admin set cannot be demoted here.
    pub async fn set_level(&self, user_id: i64, level: PermissionLevel) -> Result<(), PermissionError> {
        if self.admins.is_admin(user_id).await {
            return Err(PermissionError::PrincipalIsAdmin(user_id));
        }
        self.levels.set(user_id, level)?;
        info!("Permission of {} set to {}", user_id, level);
        Ok(())
    }

    pub fn clear_level(&self, user_id: i64) -> Result<bool, PermissionError> {
        Ok(self.levels.remove(user_id)?)
    }

    pub fn all_levels(&self) -> BTreeMap<i64, PermissionLevel> {
        self.levels.all()
    }

    pub fn clear_all(&self) -> Result<(), PermissionError> {
        Ok(self.levels.clear()?)
    }

    /// Adds to the admin set and drops any table entry, keeping the two disjoint.
    pub async fn grant_admin(&self, user_id: i64) -> Result<bool, PermissionError> {
        let added = self.admins.add_admin(user_id).await?;
        self.levels.remove(user_id)?;
        Ok(added)
    }

    pub async fn revoke_admin(&self, user_id: i64) -> Result<bool, PermissionError> {
        Ok(self.admins.remove_admin(user_id).await?)
    }

    pub async fn admins(&self) -> Vec<i64> {
        let mut all = self.admins.all_admins().await;
        all.sort_unstable();
        all
    }
}
