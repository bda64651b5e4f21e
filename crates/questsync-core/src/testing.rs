//! In-memory stand-in for the API server, used by the engine and store tests.
//!
//! It keeps its own copy of every collection and task map, answers
//! conditional fetches with 304 when nothing changed since the sent
//! timestamp, assigns ids on create, logs every call, and can be told to
//! fail the next request.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SubsecRound, Utc};

use crate::api::{ApiError, Backend, Conditional};
use crate::models::{
    Collection, CollectionId, EntryId, EntryLevel, EntryStructure, EntryTree, Subtask, Supertask,
    Task, UserId, UserTask, UserTaskStructure,
};

#[derive(Default)]
struct FakeServer {
    collections: HashMap<CollectionId, EntryTree>,
    entries_updated: HashMap<CollectionId, DateTime<Utc>>,
    tasks: HashMap<(UserId, CollectionId), UserTaskStructure>,
    tasks_updated: HashMap<(UserId, CollectionId), DateTime<Utc>>,
    current_user: UserId,
    next_id: i64,
    fail_next: Option<ApiError>,
    calls: Vec<String>,
}

impl FakeServer {
    fn begin(&mut self, call: String) -> Result<(), ApiError> {
        self.calls.push(call);
        match self.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn assign_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn collection_mut(&mut self, collection_id: CollectionId) -> Result<&mut EntryTree, ApiError> {
        match self.collections.get_mut(&collection_id) {
            Some(tree) => {
                self.entries_updated.insert(collection_id, Utc::now());
                Ok(tree)
            }
            None => Err(ApiError::NotFound(format!("collection {}", collection_id))),
        }
    }

    fn unchanged_since(updated: Option<&DateTime<Utc>>, since: Option<DateTime<Utc>>) -> bool {
        match (updated, since) {
            (Some(updated), Some(since)) => updated.trunc_subsecs(3) <= since,
            _ => false,
        }
    }
}

#[derive(Clone, Default)]
pub(crate) struct FakeBackend {
    server: Arc<Mutex<FakeServer>>,
}

impl FakeBackend {
    /// A server that authenticates every request as `user_id`.
    pub fn new(user_id: UserId) -> Self {
        let backend = Self::default();
        {
            let mut server = backend.lock();
            server.current_user = user_id;
            server.next_id = 1000;
        }
        backend
    }

    fn lock(&self) -> MutexGuard<'_, FakeServer> {
        self.server.lock().unwrap()
    }

    pub fn seed_entries(&self, collection_id: CollectionId, structure: EntryStructure) {
        let mut server = self.lock();
        server
            .collections
            .insert(collection_id, EntryTree::from_structure(collection_id, structure));
        server.entries_updated.insert(collection_id, Utc::now());
    }

    pub fn seed_tasks(&self, user_id: UserId, collection_id: CollectionId, tasks: Vec<UserTask>) {
        let mut server = self.lock();
        let map = tasks.into_iter().map(|t| (t.subtask_id, t)).collect();
        server.tasks.insert((user_id, collection_id), map);
        server.tasks_updated.insert((user_id, collection_id), Utc::now());
    }

    /// Authenticate later requests as a different user.
    pub fn login_as(&self, user_id: UserId) {
        self.lock().current_user = user_id;
    }

    pub fn fail_next(&self, err: ApiError) {
        self.lock().fail_next = Some(err);
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn server_structure(&self, collection_id: CollectionId) -> EntryStructure {
        self.lock()
            .collections
            .get(&collection_id)
            .map(|t| t.to_structure())
            .unwrap_or_default()
    }

    pub fn server_tasks(&self, user_id: UserId, collection_id: CollectionId) -> UserTaskStructure {
        self.lock()
            .tasks
            .get(&(user_id, collection_id))
            .cloned()
            .unwrap_or_default()
    }
}

impl Backend for FakeBackend {
    async fn fetch_entries(
        &self,
        collection_id: CollectionId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Conditional<EntryStructure>, ApiError> {
        let mut server = self.lock();
        server.begin(format!("GET entries/{}", collection_id))?;

        if FakeServer::unchanged_since(server.entries_updated.get(&collection_id), since) {
            return Ok(Conditional::NotModified);
        }
        let structure = server
            .collections
            .get(&collection_id)
            .map(|t| t.to_structure())
            .unwrap_or_default();
        Ok(Conditional::Modified(structure))
    }

    async fn create_entry(
        &self,
        level: EntryLevel,
        collection_id: CollectionId,
        parent_id: Option<EntryId>,
        title: &str,
    ) -> Result<EntryId, ApiError> {
        let mut server = self.lock();
        server.begin(format!("POST entries/{}/create", level.path_segment()))?;

        let id = server.assign_id();
        let tree = server.collection_mut(collection_id)?;
        let title = title.to_string();
        let inserted = match (level, parent_id) {
            (EntryLevel::Supertask, _) => {
                tree.push_supertask(Supertask {
                    id,
                    title,
                    collection_id,
                });
                true
            }
            (EntryLevel::Task, Some(supertask_id)) => tree.push_task(Task {
                id,
                supertask_id,
                title,
                collection_id,
            }),
            (EntryLevel::Subtask, Some(task_id)) => tree.push_subtask(Subtask {
                id,
                task_id,
                title,
                collection_id,
            }),
            _ => false,
        };

        if inserted {
            Ok(id)
        } else {
            Err(ApiError::NotFound(format!("parent of {} {}", level, id)))
        }
    }

    async fn update_entry(
        &self,
        level: EntryLevel,
        collection_id: CollectionId,
        entry_id: EntryId,
        title: &str,
    ) -> Result<(), ApiError> {
        let mut server = self.lock();
        server.begin(format!("PATCH entries/{}/update", level.path_segment()))?;

        let tree = server.collection_mut(collection_id)?;
        let found = match level {
            EntryLevel::Supertask => tree.rename_supertask(entry_id, title),
            EntryLevel::Task => tree.rename_task(entry_id, title),
            EntryLevel::Subtask => tree.rename_subtask(entry_id, title),
        };
        if found {
            Ok(())
        } else {
            Err(ApiError::NotFound(format!("{} {}", level, entry_id)))
        }
    }

    async fn delete_entry(
        &self,
        level: EntryLevel,
        collection_id: CollectionId,
        entry_id: EntryId,
    ) -> Result<(), ApiError> {
        let mut server = self.lock();
        server.begin(format!("DELETE entries/{}/delete", level.path_segment()))?;

        let tree = server.collection_mut(collection_id)?;
        let found = match level {
            EntryLevel::Supertask => tree.remove_supertask(entry_id),
            EntryLevel::Task => tree.remove_task(entry_id),
            EntryLevel::Subtask => tree.remove_subtask(entry_id),
        };
        if found {
            Ok(())
        } else {
            Err(ApiError::NotFound(format!("{} {}", level, entry_id)))
        }
    }

    async fn fetch_own_tasks(
        &self,
        collection_id: CollectionId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Conditional<UserTaskStructure>, ApiError> {
        let mut server = self.lock();
        server.begin(format!("GET tasks/{}", collection_id))?;

        let key = (server.current_user, collection_id);
        if FakeServer::unchanged_since(server.tasks_updated.get(&key), since) {
            return Ok(Conditional::NotModified);
        }
        Ok(Conditional::Modified(
            server.tasks.get(&key).cloned().unwrap_or_default(),
        ))
    }

    async fn fetch_user_tasks(
        &self,
        user_id: UserId,
        collection_id: CollectionId,
    ) -> Result<UserTaskStructure, ApiError> {
        let mut server = self.lock();
        server.begin(format!("GET tasks/{}/{}", user_id, collection_id))?;
        Ok(server
            .tasks
            .get(&(user_id, collection_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn create_user_task(
        &self,
        collection_id: CollectionId,
        subtask_id: EntryId,
        is_completed: bool,
        comment: &str,
    ) -> Result<i64, ApiError> {
        let mut server = self.lock();
        server.begin("POST tasks/create".to_string())?;

        let key = (server.current_user, collection_id);
        if server
            .tasks
            .get(&key)
            .is_some_and(|m| m.contains_key(&subtask_id))
        {
            return Err(ApiError::Rejected {
                status: 409,
                body: String::new(),
            });
        }

        let id = server.assign_id();
        let record = UserTask {
            id,
            user_id: key.0,
            subtask_id,
            is_completed,
            comment: comment.to_string(),
        };
        server.tasks.entry(key).or_default().insert(subtask_id, record);
        server.tasks_updated.insert(key, Utc::now());
        Ok(id)
    }

    async fn update_user_task(
        &self,
        record_id: i64,
        is_completed: bool,
        comment: &str,
    ) -> Result<(), ApiError> {
        let mut server = self.lock();
        server.begin("PATCH tasks/update".to_string())?;

        let user = server.current_user;
        let now = Utc::now();
        let FakeServer {
            tasks,
            tasks_updated,
            ..
        } = &mut *server;
        for ((owner, collection_id), map) in tasks.iter_mut() {
            if *owner != user {
                continue;
            }
            if let Some(record) = map.values_mut().find(|r| r.id == record_id) {
                record.is_completed = is_completed;
                record.comment = comment.to_string();
                tasks_updated.insert((user, *collection_id), now);
                return Ok(());
            }
        }
        Err(ApiError::NotFound(format!("user task {}", record_id)))
    }

    async fn create_collection(&self, name: &str) -> Result<Collection, ApiError> {
        let mut server = self.lock();
        server.begin("POST collections/create".to_string())?;

        let id = server.assign_id();
        let now = Utc::now();
        server.collections.insert(id, EntryTree::new(id));
        server.entries_updated.insert(id, now);
        Ok(Collection::new(id, name, now))
    }

    async fn delete_collection(&self, collection_id: CollectionId) -> Result<(), ApiError> {
        let mut server = self.lock();
        server.begin("DELETE collections/delete".to_string())?;

        match server.collections.remove(&collection_id) {
            Some(_) => {
                server.entries_updated.remove(&collection_id);
                Ok(())
            }
            None => Err(ApiError::NotFound(format!("collection {}", collection_id))),
        }
    }
}

// ===== Fixtures =====

pub(crate) fn supertask(id: EntryId, collection_id: CollectionId, title: &str) -> Supertask {
    Supertask {
        id,
        title: title.to_string(),
        collection_id,
    }
}

pub(crate) fn task(id: EntryId, supertask_id: EntryId, collection_id: CollectionId) -> Task {
    Task {
        id,
        supertask_id,
        title: format!("Task {}", id),
        collection_id,
    }
}

pub(crate) fn subtask(id: EntryId, task_id: EntryId, collection_id: CollectionId) -> Subtask {
    Subtask {
        id,
        task_id,
        title: format!("Subtask {}", id),
        collection_id,
    }
}

pub(crate) fn user_task(id: i64, user_id: UserId, subtask_id: EntryId, is_completed: bool) -> UserTask {
    UserTask {
        id,
        user_id,
        subtask_id,
        is_completed,
        comment: String::new(),
    }
}

/// Collection 1: supertasks 1 ("Airway") and 2 ("Breathing") and 3 ("Circulation").
/// Supertask 1 has task 10 (subtasks 100, 101) and task 11 (subtask 110).
pub(crate) fn sample_structure() -> EntryStructure {
    use crate::models::EntryNode;

    vec![
        EntryNode {
            entry: supertask(1, 1, "Airway"),
            children: vec![
                EntryNode {
                    entry: task(10, 1, 1),
                    children: vec![subtask(100, 10, 1), subtask(101, 10, 1)],
                },
                EntryNode {
                    entry: task(11, 1, 1),
                    children: vec![subtask(110, 11, 1)],
                },
            ],
        },
        EntryNode::leaf(supertask(2, 1, "Breathing")),
        EntryNode::leaf(supertask(3, 1, "Circulation")),
    ]
}
