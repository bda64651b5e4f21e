//! Completion percentages over an entry tree and a user's task map.

pub mod aggregator;

pub use aggregator::{
    supertask_progress, supertask_progress_at, task_progress, task_progress_at, ProgressAggregator,
};
