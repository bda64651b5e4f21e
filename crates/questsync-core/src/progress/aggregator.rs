use std::collections::HashMap;

use crate::models::{EntryId, EntryTree, UserTaskMap};

/// Percentage of a task's subtasks that have a completed record.
///
/// Subtasks without a record count toward the total only. A task with no
/// subtasks is at 0. `None` if the task is not in the tree.
pub fn task_progress(tree: &EntryTree, tasks: &UserTaskMap, task_id: EntryId) -> Option<f64> {
    let subtask_ids = tree.subtask_ids(task_id)?;
    if subtask_ids.is_empty() {
        return Some(0.0);
    }

    let completed = subtask_ids
        .iter()
        .filter(|id| tasks.is_completed(**id))
        .count();
    Some(completed as f64 / subtask_ids.len() as f64 * 100.0)
}

/// Mean of the progress of a supertask's tasks. A supertask with no tasks is
/// at 0. `None` if the supertask is not in the tree.
pub fn supertask_progress(tree: &EntryTree, tasks: &UserTaskMap, supertask_id: EntryId) -> Option<f64> {
    let task_ids = tree.task_ids(supertask_id)?;
    if task_ids.is_empty() {
        return Some(0.0);
    }

    let total: f64 = task_ids
        .iter()
        .filter_map(|id| task_progress(tree, tasks, *id))
        .sum();
    Some(total / task_ids.len() as f64)
}

/// `task_progress` for the task at a position in the tree.
pub fn task_progress_at(
    tree: &EntryTree,
    tasks: &UserTaskMap,
    supertask_index: usize,
    task_index: usize,
) -> Option<f64> {
    let task = tree.task_at(supertask_index, task_index)?;
    task_progress(tree, tasks, task.id)
}

/// `supertask_progress` for the supertask at a position in the tree.
pub fn supertask_progress_at(tree: &EntryTree, tasks: &UserTaskMap, supertask_index: usize) -> Option<f64> {
    let supertask = tree.supertask_at(supertask_index)?;
    supertask_progress(tree, tasks, supertask.id)
}

/// Memoized progress for one tree and one user's task map.
///
/// Results are kept per node id and thrown away wholesale as soon as either
/// input carries a different revision than the one they were computed from.
#[derive(Debug, Default)]
pub struct ProgressAggregator {
    stamp: Option<(u64, u64)>,
    tasks: HashMap<EntryId, f64>,
    supertasks: HashMap<EntryId, f64>,
}

impl ProgressAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of memoized results.
    pub fn len(&self) -> usize {
        self.tasks.len() + self.supertasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sync(&mut self, tree: &EntryTree, tasks: &UserTaskMap) {
        let stamp = (tree.revision(), tasks.revision());
        if self.stamp != Some(stamp) {
            self.tasks.clear();
            self.supertasks.clear();
            self.stamp = Some(stamp);
        }
    }

    pub fn task_progress(&mut self, tree: &EntryTree, tasks: &UserTaskMap, task_id: EntryId) -> Option<f64> {
        self.sync(tree, tasks);
        if let Some(progress) = self.tasks.get(&task_id) {
            return Some(*progress);
        }

        let progress = task_progress(tree, tasks, task_id)?;
        self.tasks.insert(task_id, progress);
        Some(progress)
    }

    pub fn supertask_progress(
        &mut self,
        tree: &EntryTree,
        tasks: &UserTaskMap,
        supertask_id: EntryId,
    ) -> Option<f64> {
        self.sync(tree, tasks);
        if let Some(progress) = self.supertasks.get(&supertask_id) {
            return Some(*progress);
        }

        let task_ids = tree.task_ids(supertask_id)?;
        let progress = if task_ids.is_empty() {
            0.0
        } else {
            let total: f64 = task_ids
                .iter()
                .filter_map(|id| self.task_progress(tree, tasks, *id))
                .sum();
            total / task_ids.len() as f64
        };
        self.supertasks.insert(supertask_id, progress);
        Some(progress)
    }

    pub fn task_progress_at(
        &mut self,
        tree: &EntryTree,
        tasks: &UserTaskMap,
        supertask_index: usize,
        task_index: usize,
    ) -> Option<f64> {
        let task_id = tree.task_at(supertask_index, task_index)?.id;
        self.task_progress(tree, tasks, task_id)
    }

    pub fn supertask_progress_at(
        &mut self,
        tree: &EntryTree,
        tasks: &UserTaskMap,
        supertask_index: usize,
    ) -> Option<f64> {
        let supertask_id = tree.supertask_at(supertask_index)?.id;
        self.supertask_progress(tree, tasks, supertask_id)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserTaskStructure;
    use crate::testing::{sample_structure, subtask, task, user_task};

    fn tree() -> EntryTree {
        EntryTree::from_structure(1, sample_structure())
    }

    fn tasks(records: Vec<crate::models::UserTask>) -> UserTaskMap {
        let map: UserTaskStructure = records.into_iter().map(|t| (t.subtask_id, t)).collect();
        UserTaskMap::from_records(map)
    }

    #[test]
    fn test_task_progress_counts_completed_records() {
        let tree = tree();
        let map = tasks(vec![user_task(1, 5, 100, true)]);

        assert_eq!(task_progress(&tree, &map, 10), Some(50.0));
        assert_eq!(task_progress(&tree, &map, 11), Some(0.0));
    }

    #[test]
    fn test_missing_and_incomplete_records_count_in_denominator() {
        let tree = tree();
        let map = tasks(vec![user_task(1, 5, 101, false)]);

        assert_eq!(task_progress(&tree, &map, 10), Some(0.0));
        assert_eq!(task_progress(&tree, &UserTaskMap::new(), 10), Some(0.0));
    }

    #[test]
    fn test_task_without_subtasks_is_zero() {
        let mut tree = tree();
        assert!(tree.push_task(task(12, 1, 1)));

        let progress = task_progress(&tree, &UserTaskMap::new(), 12);

        assert_eq!(progress, Some(0.0));
    }

    #[test]
    fn test_supertask_progress_is_mean_of_tasks() {
        let tree = tree();
        // Task 10 at 50%, task 11 at 100%
        let map = tasks(vec![user_task(1, 5, 100, true), user_task(2, 5, 110, true)]);

        assert_eq!(supertask_progress(&tree, &map, 1), Some(75.0));
    }

    #[test]
    fn test_supertask_without_tasks_is_zero() {
        let tree = tree();

        assert_eq!(supertask_progress(&tree, &UserTaskMap::new(), 2), Some(0.0));
    }

    #[test]
    fn test_unknown_nodes_have_no_progress() {
        let tree = tree();
        let map = UserTaskMap::new();

        assert_eq!(task_progress(&tree, &map, 99), None);
        assert_eq!(supertask_progress(&tree, &map, 99), None);
        assert_eq!(task_progress_at(&tree, &map, 0, 5), None);
        assert_eq!(supertask_progress_at(&tree, &map, 3), None);
    }

    #[test]
    fn test_positional_lookup_matches_id_lookup() {
        let tree = tree();
        let map = tasks(vec![user_task(1, 5, 110, true)]);

        assert_eq!(task_progress_at(&tree, &map, 0, 1), Some(100.0));
        assert_eq!(supertask_progress_at(&tree, &map, 0), supertask_progress(&tree, &map, 1));
    }

    #[test]
    fn test_aggregator_memoizes_until_revision_changes() {
        let tree = tree();
        let mut map = tasks(vec![user_task(1, 5, 100, true)]);
        let mut progress = ProgressAggregator::new();

        assert_eq!(progress.supertask_progress(&tree, &map, 1), Some(25.0));
        assert_eq!(progress.len(), 3);
        assert_eq!(progress.task_progress(&tree, &map, 10), Some(50.0));
        assert_eq!(progress.len(), 3);

        map.upsert(user_task(2, 5, 101, true));

        assert_eq!(progress.task_progress(&tree, &map, 10), Some(100.0));
        assert_eq!(progress.len(), 1);
        assert_eq!(progress.supertask_progress(&tree, &map, 1), Some(50.0));
    }

    #[test]
    fn test_aggregator_notices_tree_edits() {
        let mut tree = tree();
        let map = tasks(vec![user_task(1, 5, 100, true)]);
        let mut progress = ProgressAggregator::new();
        assert_eq!(progress.task_progress(&tree, &map, 10), Some(50.0));

        assert!(tree.push_subtask(subtask(102, 10, 1)));

        let updated = progress.task_progress(&tree, &map, 10).unwrap();
        assert!((updated - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggregator_switching_inputs_clears_memo() {
        let tree = tree();
        let first = tasks(vec![user_task(1, 5, 100, true)]);
        let second = tasks(vec![user_task(2, 7, 100, true), user_task(3, 7, 101, true)]);
        let mut progress = ProgressAggregator::new();

        assert_eq!(progress.task_progress(&tree, &first, 10), Some(50.0));
        assert_eq!(progress.task_progress(&tree, &second, 10), Some(100.0));
        assert_eq!(progress.task_progress_at(&tree, &first, 0, 0), Some(50.0));
        assert!(!progress.is_empty());
    }
}
