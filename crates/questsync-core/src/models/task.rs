use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{next_revision, EntryId, UserId};

/// A user's completion record for one subtask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct UserTask {
    pub id: i64,
    pub user_id: UserId,
    pub subtask_id: EntryId,
    pub is_completed: bool,
    pub comment: String,
}

/// Wire and cache format: subtask id -> record.
pub type UserTaskStructure = HashMap<EntryId, UserTask>;

/// Completion records of one user for one collection, keyed by subtask id.
///
/// Every change gives the map a fresh revision, which is how memoized
/// progress notices that it is out of date.
#[derive(Debug, Clone)]
pub struct UserTaskMap {
    records: UserTaskStructure,
    revision: u64,
}

impl UserTaskMap {
    pub fn new() -> Self {
        Self::from_records(HashMap::new())
    }

    pub fn from_records(records: UserTaskStructure) -> Self {
        Self {
            records,
            revision: next_revision(),
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, subtask_id: EntryId) -> Option<&UserTask> {
        self.records.get(&subtask_id)
    }

    /// True only when a record exists and is marked complete.
    pub fn is_completed(&self, subtask_id: EntryId) -> bool {
        self.records
            .get(&subtask_id)
            .map(|t| t.is_completed)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn completed_count(&self) -> usize {
        self.records.values().filter(|t| t.is_completed).count()
    }

    pub fn records(&self) -> &UserTaskStructure {
        &self.records
    }

    /// Insert or replace the record for its subtask.
    pub(crate) fn upsert(&mut self, task: UserTask) {
        self.records.insert(task.subtask_id, task);
        self.revision = next_revision();
    }
}

impl Default for UserTaskMap {
    fn default() -> Self {
        Self::new()
    }
}

impl From<UserTaskStructure> for UserTaskMap {
    fn from(records: UserTaskStructure) -> Self {
        Self::from_records(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, subtask_id: EntryId, is_completed: bool) -> UserTask {
        UserTask {
            id,
            user_id: 5,
            subtask_id,
            is_completed,
            comment: String::new(),
        }
    }

    #[test]
    fn test_parses_numeric_keys() {
        let body = r#"{"12":{"id":1,"userId":5,"subtaskId":12,"isCompleted":true,"comment":"done"}}"#;
        let parsed: UserTaskStructure = serde_json::from_str(body).unwrap();
        let map = UserTaskMap::from(parsed);
        assert!(map.is_completed(12));
        assert_eq!(map.get(12).unwrap().comment, "done");
    }

    #[test]
    fn test_missing_record_is_not_completed() {
        let map = UserTaskMap::new();
        assert!(!map.is_completed(3));
    }

    #[test]
    fn test_upsert_replaces_and_bumps_revision() {
        let mut map = UserTaskMap::new();
        map.upsert(record(1, 3, false));
        let before = map.revision();

        map.upsert(record(1, 3, true));

        assert_eq!(map.len(), 1);
        assert!(map.is_completed(3));
        assert_ne!(map.revision(), before);
        assert_eq!(map.completed_count(), 1);
    }

    #[test]
    fn test_fresh_maps_have_distinct_revisions() {
        let a = UserTaskMap::new();
        let b = UserTaskMap::new();
        assert_ne!(a.revision(), b.revision());
    }
}
