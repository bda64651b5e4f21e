//! Per-user completion state.
//!
//! This module provides `UserTaskStore`, which caches the active user's
//! completion records per collection and keeps the cache tied to that user.

pub mod store;

pub use store::UserTaskStore;
