use crate::models::{CollectionId, UserId};

/// Key holding the id of the user the task slots belong to.
pub const OWNER_KEY: &str = "tasksOwner";

/// Prefixes of every user-scoped key. Purged when ownership changes.
pub const USER_SCOPED_PREFIXES: [&str; 2] = ["tasks.", "taskCacheTimestamp."];

/// A cached value key and the key of its write timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSlot {
    pub value_key: String,
    pub timestamp_key: String,
}

impl CacheSlot {
    pub fn entries(collection_id: CollectionId) -> Self {
        Self {
            value_key: format!("entries.{}", collection_id),
            timestamp_key: format!("entriesCacheTimestamp.{}", collection_id),
        }
    }

    pub fn user_tasks(user_id: UserId, collection_id: CollectionId) -> Self {
        Self {
            value_key: format!("tasks.{}.{}", collection_id, user_id),
            timestamp_key: format!("taskCacheTimestamp.{}.{}", collection_id, user_id),
        }
    }

}

/// Whether `key` holds data of the cache owner.
pub fn is_user_scoped(key: &str) -> bool {
    USER_SCOPED_PREFIXES.iter().any(|p| key.starts_with(p))
}

/// Key prefixes of every user's task slots for one collection.
pub fn collection_task_prefixes(collection_id: CollectionId) -> Vec<String> {
    USER_SCOPED_PREFIXES
        .iter()
        .map(|p| format!("{}{}.", p, collection_id))
        .collect()
}
