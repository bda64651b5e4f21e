use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::{Backend, Conditional};
use crate::cache::{CacheRead, CacheSlot, LocalCache};
use crate::error::{Result, SyncError};
use crate::models::{CollectionId, EntryId, UserId, UserTask, UserTaskMap, UserTaskStructure};

/// Completion records of the active user, plus a read-only memo of other
/// users' records for inspection.
///
/// The cached task slots belong to one user at a time (the cache's owner
/// marker). Whenever the owner differs from the active user, everything held
/// for the old owner is dropped before anything is served or written.
pub struct UserTaskStore<B> {
    backend: B,
    cache: Arc<LocalCache>,
    active_user: Option<UserId>,
    own: HashMap<CollectionId, UserTaskMap>,
    others: HashMap<(UserId, CollectionId), UserTaskMap>,
}

impl<B: Backend> UserTaskStore<B> {
    pub fn new(backend: B, cache: Arc<LocalCache>) -> Self {
        Self {
            backend,
            cache,
            active_user: None,
            own: HashMap::new(),
            others: HashMap::new(),
        }
    }

    pub fn active_user(&self) -> Option<UserId> {
        self.active_user
    }

    /// The active user's records for a collection, if loaded.
    pub fn tasks(&self, collection_id: CollectionId) -> Option<&UserTaskMap> {
        self.own.get(&collection_id)
    }

    /// A memoized inspection result, if that user and collection were fetched.
    pub fn other_user_tasks(&self, user_id: UserId, collection_id: CollectionId) -> Option<&UserTaskMap> {
        self.others.get(&(user_id, collection_id))
    }

    /// How long ago the active user's records for a collection were cached.
    pub fn cache_age(&self, collection_id: CollectionId) -> Option<String> {
        let user = self.active_user?;
        let read: CacheRead<UserTaskStructure> =
            self.cache.read(&CacheSlot::user_tasks(user, collection_id));
        read.age_display()
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Make `user_id` the active user.
    ///
    /// If the cache belonged to someone else, or a different user was active,
    /// all in-memory records and user-scoped cache slots are dropped and the
    /// cache is claimed for `user_id`. Returns whether that happened.
    pub fn set_active_user(&mut self, user_id: UserId) -> bool {
        let switched = self.active_user.is_some_and(|u| u != user_id);
        let purged = self.cache.claim_owner(user_id);
        self.active_user = Some(user_id);

        if switched || purged {
            self.own.clear();
            self.others.clear();
            info!(user_id, "Task cache reset for new user");
            true
        } else {
            false
        }
    }

    /// Forget the active user and everything held for them.
    pub fn end_session(&mut self) {
        self.active_user = None;
        self.own.clear();
        self.others.clear();
        self.cache.release_owner();
        debug!("Task store session ended");
    }

    /// Reset if another writer claimed the shared cache since we last looked.
    fn check_owner(&mut self, user_id: UserId) {
        if self.cache.owner() != Some(user_id) {
            warn!(
                user_id,
                owner = ?self.cache.owner(),
                "Task cache owned by another user, discarding"
            );
            self.cache.claim_owner(user_id);
            self.own.clear();
        }
    }

    // =========================================================================
    // Fetching
    // =========================================================================

    /// Conditionally fetch the active user's records for a collection.
    ///
    /// Same protocol as entry trees: the cached timestamp is sent when a
    /// cached map exists, 304 adopts it, a full response replaces and caches
    /// it, and a failure leaves the current map alone.
    pub async fn fetch_own_tasks(&mut self, collection_id: CollectionId) -> Result<&UserTaskMap> {
        let user_id = self.active_user.ok_or(SyncError::NoActiveUser)?;
        self.check_owner(user_id);

        let slot = CacheSlot::user_tasks(user_id, collection_id);
        let cached: CacheRead<UserTaskStructure> = self.cache.read(&slot);

        let response = self
            .backend
            .fetch_own_tasks(collection_id, cached.revalidation_timestamp())
            .await;

        let records = match response {
            Ok(Conditional::NotModified) => {
                debug!(collection_id, user_id, "Tasks not modified, using cache");
                cached.value.unwrap_or_default()
            }
            Ok(Conditional::Modified(records)) => {
                debug!(collection_id, user_id, count = records.len(), "Tasks fetched");
                if let Err(e) = self.cache.write(&slot, &records) {
                    warn!(collection_id, error = %e, "Failed to cache tasks");
                }
                records
            }
            Err(e) => {
                warn!(collection_id, user_id, error = %e, "Failed to fetch tasks");
                return Err(e.into());
            }
        };

        let map = UserTaskMap::from_records(records);
        let stored: &UserTaskMap = match self.own.entry(collection_id) {
            Entry::Occupied(mut memo) => {
                memo.insert(map);
                memo.into_mut()
            }
            Entry::Vacant(memo) => memo.insert(map),
        };
        Ok(stored)
    }

    /// Fetch another user's records. Memoized for the session, never cached.
    pub async fn fetch_other_user_tasks(
        &mut self,
        collection_id: CollectionId,
        user_id: UserId,
    ) -> Result<&UserTaskMap> {
        let key = (user_id, collection_id);
        if !self.others.contains_key(&key) {
            let records = self
                .backend
                .fetch_user_tasks(user_id, collection_id)
                .await
                .map_err(|e| {
                    warn!(collection_id, user_id, error = %e, "Failed to fetch user tasks");
                    SyncError::from(e)
                })?;
            self.others.insert(key, UserTaskMap::from_records(records));
        } else {
            debug!(collection_id, user_id, "User tasks served from memo");
        }

        self.others
            .get(&key)
            .ok_or(SyncError::TasksNotLoaded(collection_id))
    }

    // =========================================================================
    // Updating
    // =========================================================================

    /// Record completion state for a subtask.
    ///
    /// Updates the existing record if there is one, otherwise creates it. The
    /// local map and cache change only after the server accepted the write.
    pub async fn update_task(
        &mut self,
        collection_id: CollectionId,
        subtask_id: EntryId,
        is_completed: bool,
        comment: &str,
    ) -> Result<()> {
        let user_id = self.active_user.ok_or(SyncError::NoActiveUser)?;
        // A foreign claim empties the map, so the write is refused below
        self.check_owner(user_id);
        let existing_id = self
            .own
            .get(&collection_id)
            .ok_or(SyncError::TasksNotLoaded(collection_id))?
            .get(subtask_id)
            .map(|t| t.id);

        let response = match existing_id {
            Some(id) => self
                .backend
                .update_user_task(id, is_completed, comment)
                .await
                .map(|_| id),
            None => {
                self.backend
                    .create_user_task(collection_id, subtask_id, is_completed, comment)
                    .await
            }
        };
        let record_id = response.map_err(|e| {
            warn!(collection_id, subtask_id, error = %e, "Server rejected task update");
            SyncError::from(e)
        })?;

        let map = self
            .own
            .get_mut(&collection_id)
            .ok_or(SyncError::TasksNotLoaded(collection_id))?;
        map.upsert(UserTask {
            id: record_id,
            user_id,
            subtask_id,
            is_completed,
            comment: comment.to_string(),
        });

        if let Err(e) = self
            .cache
            .write(&CacheSlot::user_tasks(user_id, collection_id), map.records())
        {
            warn!(collection_id, error = %e, "Failed to cache tasks");
        }

        info!(
            collection_id,
            subtask_id,
            record_id,
            is_completed,
            created = existing_id.is_none(),
            "Task updated"
        );
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
