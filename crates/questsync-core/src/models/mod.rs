//! Data models for the curriculum hierarchy and per-user completion state.
//!
//! This module contains the wire types exchanged with the API and the
//! in-memory structures built from them:
//!
//! - `Collection`: a domain/rotation owning one supertask tree
//! - `Supertask`, `Task`, `Subtask`, `EntryNode`, `EntryStructure`: the wire
//!   and cache format of the hierarchy
//! - `EntryTree`: the id-addressed in-memory form of one collection's hierarchy
//! - `UserTask`, `UserTaskMap`: per-user completion records keyed by subtask id

pub mod collection;
pub mod entry;
pub mod task;
pub mod tree;

use std::sync::atomic::{AtomicU64, Ordering};

pub use collection::Collection;
pub use entry::{EntryLevel, EntryNode, EntryStructure, Subtask, Supertask, SupertaskNode, Task, TaskNode};
pub use task::{UserTask, UserTaskMap, UserTaskStructure};
pub use tree::EntryTree;

/// Identifier of a collection (domain/rotation).
pub type CollectionId = i64;

/// Identifier of a supertask, task or subtask. Unique per level.
pub type EntryId = i64;

/// Identifier of a user account.
pub type UserId = i64;

static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

/// Hand out a process-unique revision stamp.
///
/// Trees and task maps take a fresh stamp every time their contents change,
/// so two stamps compare equal only if nothing changed in between.
pub(crate) fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}
