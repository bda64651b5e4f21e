use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::{Backend, Conditional};
use crate::cache::keys::collection_task_prefixes;
use crate::cache::{CacheRead, CacheSlot, LocalCache};
use crate::error::{Result, SyncError};
use crate::models::{
    Collection, CollectionId, EntryId, EntryLevel, EntryStructure, EntryTree, Subtask, Supertask,
    Task,
};

/// Loads and edits the entry trees of collections.
///
/// Trees are memoized for the lifetime of the engine: once a collection has
/// been fetched, `fetch_entries` answers from memory. Every edit goes to the
/// server first and touches the tree and the cache only once it succeeded.
pub struct SyncEngine<B> {
    backend: B,
    cache: Arc<LocalCache>,
    trees: HashMap<CollectionId, EntryTree>,
}

impl<B: Backend> SyncEngine<B> {
    pub fn new(backend: B, cache: Arc<LocalCache>) -> Self {
        Self {
            backend,
            cache,
            trees: HashMap::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The memoized tree of a collection, if it has been loaded.
    pub fn tree(&self, collection_id: CollectionId) -> Option<&EntryTree> {
        self.trees.get(&collection_id)
    }

    /// Drop the memoized tree so the next fetch revalidates. The cached copy
    /// stays and is offered to the server on that fetch.
    pub fn forget(&mut self, collection_id: CollectionId) {
        self.trees.remove(&collection_id);
    }

    // =========================================================================
    // Fetching
    // =========================================================================

    /// Return the collection's tree, fetching it only if it is not memoized.
    pub async fn fetch_entries(&mut self, collection_id: CollectionId) -> Result<&EntryTree> {
        if self.trees.contains_key(&collection_id) {
            debug!(collection_id, "Entries served from memo");
            return self.loaded(collection_id);
        }
        self.revalidate_entries(collection_id).await
    }

    /// Conditionally fetch the collection's tree, ignoring the memo.
    ///
    /// The cached timestamp is sent along when a cached tree exists. A 304
    /// adopts the cached tree; a full response replaces it and is cached. On
    /// failure the memoized tree, if any, is left untouched.
    pub async fn revalidate_entries(&mut self, collection_id: CollectionId) -> Result<&EntryTree> {
        let slot = CacheSlot::entries(collection_id);
        let cached: CacheRead<EntryStructure> = self.cache.read(&slot);

        let response = self
            .backend
            .fetch_entries(collection_id, cached.revalidation_timestamp())
            .await;

        let structure = match response {
            Ok(Conditional::NotModified) => {
                debug!(collection_id, "Entries not modified, using cache");
                cached.value.unwrap_or_default()
            }
            Ok(Conditional::Modified(structure)) => {
                debug!(collection_id, supertasks = structure.len(), "Entries fetched");
                if let Err(e) = self.cache.write(&slot, &structure) {
                    warn!(collection_id, error = %e, "Failed to cache entries");
                }
                structure
            }
            Err(e) => {
                warn!(collection_id, error = %e, "Failed to fetch entries");
                return Err(e.into());
            }
        };

        let tree = EntryTree::from_structure(collection_id, structure);
        let memoized: &EntryTree = match self.trees.entry(collection_id) {
            Entry::Occupied(mut memo) => {
                memo.insert(tree);
                memo.into_mut()
            }
            Entry::Vacant(memo) => memo.insert(tree),
        };
        Ok(memoized)
    }

    // =========================================================================
    // Supertasks
    // =========================================================================

    /// Append a new supertask. Returns the id the server assigned.
    pub async fn create_supertask(&mut self, collection_id: CollectionId, title: &str) -> Result<EntryId> {
        self.loaded(collection_id)?;

        let id = self
            .confirm(
                EntryLevel::Supertask,
                collection_id,
                self.backend
                    .create_entry(EntryLevel::Supertask, collection_id, None, title)
                    .await,
            )?;

        self.apply(collection_id, EntryLevel::Supertask, id, |tree| {
            tree.push_supertask(Supertask {
                id,
                title: title.to_string(),
                collection_id,
            });
            true
        })?;
        info!(collection_id, supertask_id = id, "Supertask created");
        Ok(id)
    }

    pub async fn update_supertask(
        &mut self,
        collection_id: CollectionId,
        supertask_id: EntryId,
        title: &str,
    ) -> Result<()> {
        self.ensure(collection_id, EntryLevel::Supertask, supertask_id)?;

        self.confirm(
            EntryLevel::Supertask,
            collection_id,
            self.backend
                .update_entry(EntryLevel::Supertask, collection_id, supertask_id, title)
                .await,
        )?;

        self.apply(collection_id, EntryLevel::Supertask, supertask_id, |tree| {
            tree.rename_supertask(supertask_id, title)
        })?;
        info!(collection_id, supertask_id, "Supertask renamed");
        Ok(())
    }

    /// Delete a supertask and, with it, its tasks and subtasks.
    pub async fn delete_supertask(&mut self, collection_id: CollectionId, supertask_id: EntryId) -> Result<()> {
        self.ensure(collection_id, EntryLevel::Supertask, supertask_id)?;

        self.confirm(
            EntryLevel::Supertask,
            collection_id,
            self.backend
                .delete_entry(EntryLevel::Supertask, collection_id, supertask_id)
                .await,
        )?;

        self.apply(collection_id, EntryLevel::Supertask, supertask_id, |tree| {
            tree.remove_supertask(supertask_id)
        })?;
        info!(collection_id, supertask_id, "Supertask deleted");
        Ok(())
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    /// Append a new task to a supertask. Returns the id the server assigned.
    pub async fn create_task(
        &mut self,
        collection_id: CollectionId,
        supertask_id: EntryId,
        title: &str,
    ) -> Result<EntryId> {
        self.ensure(collection_id, EntryLevel::Supertask, supertask_id)?;

        let id = self.confirm(
            EntryLevel::Task,
            collection_id,
            self.backend
                .create_entry(EntryLevel::Task, collection_id, Some(supertask_id), title)
                .await,
        )?;

        self.apply(collection_id, EntryLevel::Supertask, supertask_id, |tree| {
            tree.push_task(Task {
                id,
                supertask_id,
                title: title.to_string(),
                collection_id,
            })
        })?;
        info!(collection_id, supertask_id, task_id = id, "Task created");
        Ok(id)
    }

    pub async fn update_task(&mut self, collection_id: CollectionId, task_id: EntryId, title: &str) -> Result<()> {
        self.ensure(collection_id, EntryLevel::Task, task_id)?;

        self.confirm(
            EntryLevel::Task,
            collection_id,
            self.backend
                .update_entry(EntryLevel::Task, collection_id, task_id, title)
                .await,
        )?;

        self.apply(collection_id, EntryLevel::Task, task_id, |tree| {
            tree.rename_task(task_id, title)
        })?;
        info!(collection_id, task_id, "Task renamed");
        Ok(())
    }

    /// Delete a task and its subtasks.
    pub async fn delete_task(&mut self, collection_id: CollectionId, task_id: EntryId) -> Result<()> {
        self.ensure(collection_id, EntryLevel::Task, task_id)?;

        self.confirm(
            EntryLevel::Task,
            collection_id,
            self.backend
                .delete_entry(EntryLevel::Task, collection_id, task_id)
                .await,
        )?;

        self.apply(collection_id, EntryLevel::Task, task_id, |tree| {
            tree.remove_task(task_id)
        })?;
        info!(collection_id, task_id, "Task deleted");
        Ok(())
    }

    // =========================================================================
    // Subtasks
    // =========================================================================

    /// Append a new subtask to a task. Returns the id the server assigned.
    pub async fn create_subtask(
        &mut self,
        collection_id: CollectionId,
        task_id: EntryId,
        title: &str,
    ) -> Result<EntryId> {
        self.ensure(collection_id, EntryLevel::Task, task_id)?;

        let id = self.confirm(
            EntryLevel::Subtask,
            collection_id,
            self.backend
                .create_entry(EntryLevel::Subtask, collection_id, Some(task_id), title)
                .await,
        )?;

        self.apply(collection_id, EntryLevel::Task, task_id, |tree| {
            tree.push_subtask(Subtask {
                id,
                task_id,
                title: title.to_string(),
                collection_id,
            })
        })?;
        info!(collection_id, task_id, subtask_id = id, "Subtask created");
        Ok(id)
    }

    pub async fn update_subtask(
        &mut self,
        collection_id: CollectionId,
        subtask_id: EntryId,
        title: &str,
    ) -> Result<()> {
        self.ensure(collection_id, EntryLevel::Subtask, subtask_id)?;

        self.confirm(
            EntryLevel::Subtask,
            collection_id,
            self.backend
                .update_entry(EntryLevel::Subtask, collection_id, subtask_id, title)
                .await,
        )?;

        self.apply(collection_id, EntryLevel::Subtask, subtask_id, |tree| {
            tree.rename_subtask(subtask_id, title)
        })?;
        info!(collection_id, subtask_id, "Subtask renamed");
        Ok(())
    }

    pub async fn delete_subtask(&mut self, collection_id: CollectionId, subtask_id: EntryId) -> Result<()> {
        self.ensure(collection_id, EntryLevel::Subtask, subtask_id)?;

        self.confirm(
            EntryLevel::Subtask,
            collection_id,
            self.backend
                .delete_entry(EntryLevel::Subtask, collection_id, subtask_id)
                .await,
        )?;

        self.apply(collection_id, EntryLevel::Subtask, subtask_id, |tree| {
            tree.remove_subtask(subtask_id)
        })?;
        info!(collection_id, subtask_id, "Subtask deleted");
        Ok(())
    }

    // =========================================================================
    // Collections
    // =========================================================================

    /// Create a collection. Its (empty) tree is memoized and cached right away.
    pub async fn create_collection(&mut self, name: &str) -> Result<Collection> {
        let collection = self.backend.create_collection(name).await.map_err(|e| {
            warn!(name = name, error = %e, "Server rejected collection create");
            SyncError::from(e)
        })?;

        let tree = EntryTree::new(collection.id);
        if let Err(e) = self
            .cache
            .write(&CacheSlot::entries(collection.id), &tree.to_structure())
        {
            warn!(collection_id = collection.id, error = %e, "Failed to cache entries");
        }
        self.trees.insert(collection.id, tree);

        info!(collection_id = collection.id, name = name, "Collection created");
        Ok(collection)
    }

    /// Delete a collection and everything held for it locally, including
    /// every user's cached task records for it.
    pub async fn delete_collection(&mut self, collection_id: CollectionId) -> Result<()> {
        self.backend
            .delete_collection(collection_id)
            .await
            .map_err(|e| {
                warn!(collection_id, error = %e, "Server rejected collection delete");
                SyncError::from(e)
            })?;

        self.trees.remove(&collection_id);
        self.cache.remove(&CacheSlot::entries(collection_id));
        for prefix in collection_task_prefixes(collection_id) {
            self.cache.remove_prefix(&prefix);
        }
        info!(collection_id, "Collection deleted");
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn loaded(&self, collection_id: CollectionId) -> Result<&EntryTree> {
        self.trees
            .get(&collection_id)
            .ok_or(SyncError::NotLoaded(collection_id))
    }

    /// Check that a node exists locally before asking the server to touch it.
    fn ensure(&self, collection_id: CollectionId, level: EntryLevel, id: EntryId) -> Result<()> {
        let tree = self.loaded(collection_id)?;
        let exists = match level {
            EntryLevel::Supertask => tree.supertask(id).is_some(),
            EntryLevel::Task => tree.task(id).is_some(),
            EntryLevel::Subtask => tree.subtask(id).is_some(),
        };
        if exists {
            Ok(())
        } else {
            Err(SyncError::UnknownEntry {
                level,
                id,
                collection_id,
            })
        }
    }

    fn confirm<T>(
        &self,
        level: EntryLevel,
        collection_id: CollectionId,
        response: std::result::Result<T, crate::api::ApiError>,
    ) -> Result<T> {
        response.map_err(|e| {
            warn!(collection_id, level = %level, error = %e, "Server rejected entry write");
            SyncError::from(e)
        })
    }

    /// Apply a confirmed edit to the memoized tree, then re-cache the tree.
    /// `target` names the node the edit hangs off, for the error if it is gone.
    fn apply(
        &mut self,
        collection_id: CollectionId,
        level: EntryLevel,
        target: EntryId,
        edit: impl FnOnce(&mut EntryTree) -> bool,
    ) -> Result<()> {
        let tree = self
            .trees
            .get_mut(&collection_id)
            .ok_or(SyncError::NotLoaded(collection_id))?;

        if !edit(tree) {
            return Err(SyncError::UnknownEntry {
                level,
                id: target,
                collection_id,
            });
        }

        if let Err(e) = self
            .cache
            .write(&CacheSlot::entries(collection_id), &tree.to_structure())
        {
            warn!(collection_id, error = %e, "Failed to cache entries");
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
