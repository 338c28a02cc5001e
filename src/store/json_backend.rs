//! JSON-file-per-user profile store.
//!
//! Layout: `<root>/<user_id>/profile.json`. Writes go to a temp file and
//! are renamed into place; a per-user async lock makes the version check
//! and the rename one atomic step. The lock is held only for the commit,
//! never across adapter calls.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::profile::UserProfile;
use crate::store::ProfileStore;

pub struct JsonFileStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl JsonFileStore {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    fn profile_path(&self, user_id: &str) -> PathBuf {
        // User ids come from the transport; keep them from escaping the root.
        let safe: String = user_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(safe).join("profile.json")
    }

    async fn lock_for(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn read_profile(&self, path: &Path) -> Result<Option<UserProfile>, StorageError> {
        match tokio::fs::read_to_string(path).await {
            Ok(body) => {
                let profile = serde_json::from_str(&body)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(profile))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_profile(&self, path: &Path, profile: &UserProfile) -> Result<(), StorageError> {
        let parent = path
            .parent()
            .ok_or_else(|| StorageError::Serialization("profile path has no parent".into()))?;
        tokio::fs::create_dir_all(parent).await?;
        let body = serde_json::to_string_pretty(profile)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for JsonFileStore {
    async fn load(&self, user_id: &str) -> Result<Option<(UserProfile, u64)>, StorageError> {
        let lock = self.lock_for(user_id).await;
        let _guard = lock.lock().await;
        let path = self.profile_path(user_id);
        Ok(self
            .read_profile(&path)
            .await?
            .map(|p| { let v = p.version; (p, v) }))
    }

    async fn commit(
        &self,
        profile: &UserProfile,
        expected_version: u64,
    ) -> Result<u64, StorageError> {
        let lock = self.lock_for(&profile.user_id).await;
        let _guard = lock.lock().await;

        let path = self.profile_path(&profile.user_id);
        let found = self
            .read_profile(&path)
            .await?
            .map(|p| p.version)
            .unwrap_or(0);
        if found != expected_version {
            return Err(StorageError::Conflict {
                user_id: profile.user_id.clone(),
                expected: expected_version,
                found,
            });
        }

        let mut committed = profile.clone();
        committed.version = expected_version + 1;
        committed.updated_at = chrono::Utc::now();
        self.write_profile(&path, &committed).await?;
        Ok(committed.version)
    }

    async fn user_ids(&self) -> Result<Vec<String>, StorageError> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if tokio::fs::try_exists(entry.path().join("profile.json")).await? {
                    ids.push(name.to_string());
                }
            }
        }
        Ok(ids)
    }
}
