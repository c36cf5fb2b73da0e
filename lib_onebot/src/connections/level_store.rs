//! # JSON Permission Table
//!
//! Stored as `{"users": {"<id>": "user|op|admin"}}`. Unrecognized level names
//! are kept on disk but read as absent.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::core::permission::{LevelStore, PermissionLevel};
use crate::error::StoreError;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct LevelFile {
    #[serde(default)]
    users: BTreeMap<String, String>,
}

pub struct JsonLevelStore {
    path: PathBuf,
    data: Mutex<LevelFile>,
}

impl JsonLevelStore {
    /// Loads the table. A missing file starts empty; a corrupt one is logged
    /// and reset to empty.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str::<LevelFile>(&contents).unwrap_or_else(|e| {
                error!("Failed to parse {}: {}", path.display(), e);
                LevelFile::default()
            })
        } else {
            LevelFile::default()
        };
        debug!("Loaded {} permission entries from {}", data.users.len(), path.display());
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Caller holds the data lock, so writes are serialized.
    fn save(&self, data: &LevelFile) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(data)?)?;
        Ok(())
    }

    // Memory only takes the new table once it is on disk.
    fn update<R>(&self, f: impl FnOnce(&mut LevelFile) -> R) -> Result<R, StoreError> {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = data.clone();
        let out = f(&mut next);
        self.save(&next)?;
        *data = next;
        Ok(out)
    }
}

impl LevelStore for JsonLevelStore {
    fn get(&self, user_id: i64) -> Option<PermissionLevel> {
        let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        data.users.get(&user_id.to_string())?.parse().ok()
    }

    fn set(&self, user_id: i64, level: PermissionLevel) -> Result<(), StoreError> {
        self.update(|d| {
            d.users.insert(user_id.to_string(), level.name().to_string());
        })
    }

    fn remove(&self, user_id: i64) -> Result<bool, StoreError> {
        self.update(|d| d.users.remove(&user_id.to_string()).is_some())
    }

    fn all(&self) -> BTreeMap<i64, PermissionLevel> {
        let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        data.users
            .iter()
            .filter_map(|(id, level)| Some((id.parse().ok()?, level.parse().ok()?)))
            .collect()
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.update(|d| d.users.clear())
    }
}
