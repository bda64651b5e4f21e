//! questsync core library.
//!
//! Client-side synchronization for competency collections: a three-level
//! entry tree (supertask → task → subtask) per collection, each user's
//! completion records, and progress percentages over both. Data is fetched
//! with timestamped conditional requests against a session-scoped cache, and
//! every edit is applied locally only after the server accepted it.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod progress;
pub mod sync;
pub mod tasks;
pub mod utils;

#[cfg(test)]
mod testing;

pub use api::{ApiClient, ApiError, Backend, Conditional};
pub use cache::LocalCache;
pub use config::Config;
pub use error::{Result, SyncError};
pub use models::{Collection, EntryLevel, EntryTree, UserTask, UserTaskMap};
pub use progress::ProgressAggregator;
pub use sync::SyncEngine;
pub use tasks::UserTaskStore;
