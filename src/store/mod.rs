//! Profile persistence — versioned whole-record commits.

pub mod json_backend;
pub mod memory;

pub use json_backend::JsonFileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::profile::UserProfile;

/// Backend-agnostic profile store.
///
/// Commits are whole-record and guarded by an optimistic version check: the
/// caller passes the version it loaded, and the store rejects the write with
/// `StorageError::Conflict` if another commit got there first. There are no
/// partial-field updates and no long-held locks — the record is only locked
/// at the point of commit.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Load a profile and the version to use for the next commit. `None`
    /// means the user has never been seen.
    async fn load(&self, user_id: &str) -> Result<Option<(UserProfile, u64)>, StorageError>;

    /// Commit the whole record. `expected_version` must match the stored
    /// version (0 for a first write). Returns the new version.
    async fn commit(
        &self,
        profile: &UserProfile,
        expected_version: u64,
    ) -> Result<u64, StorageError>;

    /// All known user ids (used by the startup recovery sweep).
    async fn user_ids(&self) -> Result<Vec<String>, StorageError>;
}
