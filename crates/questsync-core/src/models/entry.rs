//! Wire and cache representation of the three-level entry hierarchy.

use serde::{Deserialize, Serialize};

use super::{CollectionId, EntryId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct Supertask {
    pub id: EntryId,
    pub title: String,
    pub collection_id: CollectionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct Task {
    pub id: EntryId,
    pub supertask_id: EntryId,
    pub title: String,
    pub collection_id: CollectionId,
}

/// Leaf of the hierarchy. Completion lives in `UserTask`, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct Subtask {
    pub id: EntryId,
    pub task_id: EntryId,
    pub title: String,
    pub collection_id: CollectionId,
}

/// An entry together with its ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct EntryNode<T, U> {
    pub entry: T,
    pub children: Vec<U>,
}

impl<T, U> EntryNode<T, U> {
    pub fn leaf(entry: T) -> Self {
        Self {
            entry,
            children: Vec::new(),
        }
    }
}

pub type TaskNode = EntryNode<Task, Subtask>;
pub type SupertaskNode = EntryNode<Supertask, TaskNode>;

/// Ordered supertasks of one collection, two levels deep.
pub type EntryStructure = Vec<SupertaskNode>;

/// The three hierarchy levels, as they appear in endpoint paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryLevel {
    Supertask,
    Task,
    Subtask,
}

impl EntryLevel {
    /// Path segment used by the entry endpoints.
    pub fn path_segment(&self) -> &'static str {
        match self {
            EntryLevel::Supertask => "supertasks",
            EntryLevel::Task => "tasks",
            EntryLevel::Subtask => "subtasks",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            EntryLevel::Supertask => "supertask",
            EntryLevel::Task => "task",
            EntryLevel::Subtask => "subtask",
        }
    }
}

impl std::fmt::Display for EntryLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}
