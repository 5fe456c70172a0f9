//! Publication directory: which user publishes which filenames.
//!
//! A filename appears at most once per user but may be published by any
//! number of users. Publications are independent of sessions: they survive
//! session expiry and exit, and GET is what filters out unreachable owners.
//!
//! Traversal order is users in name order, then each user's files in name order.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("{username} does not publish {filename}")]
    NotPublished { username: String, filename: String },
}

/// Shared handle to the publication table. Cloning shares the same table.
#[derive(Clone, Default)]
pub struct PublicationDirectory {
    files: Arc<Mutex<BTreeMap<String, BTreeSet<String>>>>,
}

impl PublicationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent insert. Returns true if the entry is new.
    pub async fn publish(&self, username: &str, filename: &str) -> bool {
        self.files
            .lock()
            .await
            .entry(username.to_string())
            .or_default()
            .insert(filename.to_string())
    }

    /// Remove one entry, failing if it was not there.
    pub async fn unpublish(&self, username: &str, filename: &str) -> Result<(), DirectoryError> {
        let mut files = self.files.lock().await;
        let removed = match files.get_mut(username) {
            Some(set) => {
                let removed = set.remove(filename);
                if set.is_empty() {
                    files.remove(username);
                }
                removed
            }
            None => false,
        };
        if removed {
            Ok(())
        } else {
            Err(DirectoryError::NotPublished {
                username: username.to_string(),
                filename: filename.to_string(),
            })
        }
    }

    pub async fn list_published(&self, username: &str) -> Vec<String> {
        self.files
            .lock()
            .await
            .get(username)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Filenames of other users containing `substring` (literal,
    /// case-sensitive). The same name under two users is reported twice.
    pub async fn search(&self, substring: &str, excluding: &str) -> Vec<String> {
        self.files
            .lock()
            .await
            .iter()
            .filter(|(user, _)| user.as_str() != excluding)
            .flat_map(|(_, set)| set.iter())
            .filter(|f| f.contains(substring))
            .cloned()
            .collect()
    }

    /// First other user publishing exactly `filename`.
    pub async fn find_owner(&self, filename: &str, excluding: &str) -> Option<String> {
        self.files
            .lock()
            .await
            .iter()
            .find(|(user, set)| user.as_str() != excluding && set.contains(filename))
            .map(|(user, _)| user.clone())
    }

    /// Total number of (user, filename) entries.
    pub async fn len(&self) -> usize {
        self.files.lock().await.values().map(BTreeSet::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.lock().await.is_empty()
    }
}
