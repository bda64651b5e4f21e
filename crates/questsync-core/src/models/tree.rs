//! In-memory hierarchy of one collection, addressed by stable entry id.
//!
//! The wire format (`EntryStructure`) nests children in arrays, so an array
//! position is the only handle a caller has on a node. Positions go stale as
//! soon as an earlier sibling is removed. `EntryTree` instead keeps every
//! node in an id -> node map and records order in separate id lists, so
//! mutations address nodes by id and positions are only used for reads.

use std::collections::HashMap;

use super::{
    next_revision, CollectionId, EntryId, EntryNode, EntryStructure, Subtask, Supertask, Task,
};

/// An entry with the ordered ids of its children.
#[derive(Debug, Clone)]
struct Branch<T> {
    entry: T,
    children: Vec<EntryId>,
}

impl<T> Branch<T> {
    fn new(entry: T) -> Self {
        Self {
            entry,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EntryTree {
    collection_id: CollectionId,
    supertask_order: Vec<EntryId>,
    supertasks: HashMap<EntryId, Branch<Supertask>>,
    tasks: HashMap<EntryId, Branch<Task>>,
    subtasks: HashMap<EntryId, Subtask>,
    revision: u64,
}

impl EntryTree {
    pub fn new(collection_id: CollectionId) -> Self {
        Self {
            collection_id,
            supertask_order: Vec::new(),
            supertasks: HashMap::new(),
            tasks: HashMap::new(),
            subtasks: HashMap::new(),
            revision: next_revision(),
        }
    }

    /// Build a tree from the nested wire format, preserving sibling order.
    ///
    /// The nesting decides each node's parent; a `supertask_id`/`task_id`
    /// that disagrees with it is overwritten.
    pub fn from_structure(collection_id: CollectionId, structure: EntryStructure) -> Self {
        let mut tree = Self::new(collection_id);

        for supertask_node in structure {
            let supertask_id = supertask_node.entry.id;
            let mut supertask = Branch::new(supertask_node.entry);

            for mut task_node in supertask_node.children {
                let task_id = task_node.entry.id;
                task_node.entry.supertask_id = supertask_id;
                let mut task = Branch::new(task_node.entry);

                for mut subtask in task_node.children {
                    subtask.task_id = task_id;
                    task.children.push(subtask.id);
                    tree.subtasks.insert(subtask.id, subtask);
                }

                supertask.children.push(task_id);
                tree.tasks.insert(task_id, task);
            }

            tree.supertask_order.push(supertask_id);
            tree.supertasks.insert(supertask_id, supertask);
        }

        tree
    }

    /// Flatten back into the nested wire format used by the API and the cache.
    pub fn to_structure(&self) -> EntryStructure {
        self.supertask_order
            .iter()
            .filter_map(|id| self.supertasks.get(id))
            .map(|supertask| EntryNode {
                entry: supertask.entry.clone(),
                children: supertask
                    .children
                    .iter()
                    .filter_map(|id| self.tasks.get(id))
                    .map(|task| EntryNode {
                        entry: task.entry.clone(),
                        children: task
                            .children
                            .iter()
                            .filter_map(|id| self.subtasks.get(id))
                            .cloned()
                            .collect(),
                    })
                    .collect(),
            })
            .collect()
    }

    pub fn collection_id(&self) -> CollectionId {
        self.collection_id
    }

    /// Changes whenever the tree's contents change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_empty(&self) -> bool {
        self.supertask_order.is_empty()
    }

    // ===== Supertasks =====

    pub fn supertask_ids(&self) -> &[EntryId] {
        &self.supertask_order
    }

    pub fn supertask(&self, id: EntryId) -> Option<&Supertask> {
        self.supertasks.get(&id).map(|b| &b.entry)
    }

    pub fn supertask_at(&self, index: usize) -> Option<&Supertask> {
        self.supertask_order
            .get(index)
            .and_then(|id| self.supertask(*id))
    }

    pub fn supertask_position(&self, id: EntryId) -> Option<usize> {
        self.supertask_order.iter().position(|s| *s == id)
    }

    pub fn supertasks(&self) -> impl Iterator<Item = &Supertask> {
        self.supertask_order
            .iter()
            .filter_map(|id| self.supertask(*id))
    }

    // ===== Tasks =====

    /// Ordered task ids of a supertask, or `None` if the supertask is unknown.
    pub fn task_ids(&self, supertask_id: EntryId) -> Option<&[EntryId]> {
        self.supertasks
            .get(&supertask_id)
            .map(|b| b.children.as_slice())
    }

    pub fn task(&self, id: EntryId) -> Option<&Task> {
        self.tasks.get(&id).map(|b| &b.entry)
    }

    pub fn task_at(&self, supertask_index: usize, task_index: usize) -> Option<&Task> {
        let supertask_id = *self.supertask_order.get(supertask_index)?;
        let task_id = *self.task_ids(supertask_id)?.get(task_index)?;
        self.task(task_id)
    }

    // ===== Subtasks =====

    /// Ordered subtask ids of a task, or `None` if the task is unknown.
    pub fn subtask_ids(&self, task_id: EntryId) -> Option<&[EntryId]> {
        self.tasks.get(&task_id).map(|b| b.children.as_slice())
    }

    pub fn subtask(&self, id: EntryId) -> Option<&Subtask> {
        self.subtasks.get(&id)
    }

    pub fn subtask_count(&self) -> usize {
        self.subtasks.len()
    }

    // ===== Structural edits =====
    //
    // Callers check existence first, so these report a missing target with
    // `false` rather than an error.

    pub(crate) fn push_supertask(&mut self, supertask: Supertask) {
        self.supertask_order.push(supertask.id);
        self.supertasks.insert(supertask.id, Branch::new(supertask));
        self.touch();
    }

    pub(crate) fn rename_supertask(&mut self, id: EntryId, title: &str) -> bool {
        match self.supertasks.get_mut(&id) {
            Some(branch) => {
                branch.entry.title = title.to_string();
                self.touch();
                true
            }
            None => false,
        }
    }

    /// Remove a supertask together with its tasks and their subtasks.
    pub(crate) fn remove_supertask(&mut self, id: EntryId) -> bool {
        let Some(branch) = self.supertasks.remove(&id) else {
            return false;
        };
        self.supertask_order.retain(|s| *s != id);
        for task_id in branch.children {
            self.drop_task(task_id);
        }
        self.touch();
        true
    }

    pub(crate) fn push_task(&mut self, task: Task) -> bool {
        let Some(parent) = self.supertasks.get_mut(&task.supertask_id) else {
            return false;
        };
        parent.children.push(task.id);
        self.tasks.insert(task.id, Branch::new(task));
        self.touch();
        true
    }

    pub(crate) fn rename_task(&mut self, id: EntryId, title: &str) -> bool {
        match self.tasks.get_mut(&id) {
            Some(branch) => {
                branch.entry.title = title.to_string();
                self.touch();
                true
            }
            None => false,
        }
    }

    /// Remove a task together with its subtasks.
    pub(crate) fn remove_task(&mut self, id: EntryId) -> bool {
        let Some(parent_id) = self.tasks.get(&id).map(|b| b.entry.supertask_id) else {
            return false;
        };
        if let Some(parent) = self.supertasks.get_mut(&parent_id) {
            parent.children.retain(|t| *t != id);
        }
        self.drop_task(id);
        self.touch();
        true
    }

    pub(crate) fn push_subtask(&mut self, subtask: Subtask) -> bool {
        let Some(parent) = self.tasks.get_mut(&subtask.task_id) else {
            return false;
        };
        parent.children.push(subtask.id);
        self.subtasks.insert(subtask.id, subtask);
        self.touch();
        true
    }

    pub(crate) fn rename_subtask(&mut self, id: EntryId, title: &str) -> bool {
        match self.subtasks.get_mut(&id) {
            Some(subtask) => {
                subtask.title = title.to_string();
                self.touch();
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove_subtask(&mut self, id: EntryId) -> bool {
        let Some(subtask) = self.subtasks.remove(&id) else {
            return false;
        };
        if let Some(parent) = self.tasks.get_mut(&subtask.task_id) {
            parent.children.retain(|s| *s != id);
        }
        self.touch();
        true
    }

    fn drop_task(&mut self, task_id: EntryId) {
        if let Some(task) = self.tasks.remove(&task_id) {
            for subtask_id in task.children {
                self.subtasks.remove(&subtask_id);
            }
        }
    }

    fn touch(&mut self) {
        self.revision = next_revision();
    }
}
