//! In-memory profile store.
//!
//! The reference implementation of the commit CAS semantics; also what the
//! scenario tests run against.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::profile::UserProfile;
use crate::store::ProfileStore;

#[derive(Default)]
pub struct MemoryStore {
    profiles: Mutex<HashMap<String, UserProfile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn load(&self, user_id: &str) -> Result<Option<(UserProfile, u64)>, StorageError> {
        let profiles = self.profiles.lock().await;
        Ok(profiles
            .get(user_id)
            .map(|p| (p.clone(), p.version)))
    }

    async fn commit(
        &self,
        profile: &UserProfile,
        expected_version: u64,
    ) -> Result<u64, StorageError> {
        let mut profiles = self.profiles.lock().await;
        let found = profiles
            .get(&profile.user_id)
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
        let new_version = committed.version;
        profiles.insert(profile.user_id.clone(), committed);
        Ok(new_version)
    }

    async fn user_ids(&self) -> Result<Vec<String>, StorageError> {
        let profiles = self.profiles.lock().await;
        Ok(profiles.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_commit_creates() {
        let store = MemoryStore::new();
        let profile = UserProfile::new("u1");
        let version = store.commit(&profile, 0).await.unwrap();
        assert_eq!(version, 1);

        let (loaded, loaded_version) = store.load("u1").await.unwrap().unwrap();
        assert_eq!(loaded.user_id, "u1");
        assert_eq!(loaded_version, 1);
    }

    #[tokio::test]
    async fn stale_commit_is_rejected() {
        let store = MemoryStore::new();
        let profile = UserProfile::new("u1");
        store.commit(&profile, 0).await.unwrap();

        // Two writers both observed version 1.
        let (a, va) = store.load("u1").await.unwrap().unwrap();
        let (b, vb) = store.load("u1").await.unwrap().unwrap();
        assert_eq!(va, vb);

        store.commit(&a, va).await.unwrap();
        let err = store.commit(&b, vb).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn concurrent_commits_exactly_one_wins() {
        use std::sync::Arc;
        let store = Arc::new(MemoryStore::new());
        let profile = UserProfile::new("u1");
        store.commit(&profile, 0).await.unwrap();
        let (loaded, version) = store.load("u1").await.unwrap().unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let profile = loaded.clone();
            handles.push(tokio::spawn(async move {
                store.commit(&profile, version).await.is_ok()
            }));
        }
        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn unknown_user_loads_none() {
        let store = MemoryStore::new();
        assert!(store.load("nobody").await.unwrap().is_none());
    }
}
