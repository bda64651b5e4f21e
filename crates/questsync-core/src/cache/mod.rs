//! Session-scoped caching of entry trees and completion records.
//!
//! This module provides `LocalCache`, a string key/value store shared by the
//! sync engine and the task store. Every value slot has a companion
//! timestamp key recording when it was last written; the timestamp is what
//! conditional fetches send back to the server.
//!
//! Key layout:
//! - `entries.{collectionId}` / `entriesCacheTimestamp.{collectionId}`
//! - `tasks.{collectionId}.{userId}` / `taskCacheTimestamp.{collectionId}.{userId}`
//! - `tasksOwner`: the user the task slots belong to
//!
//! Nothing expires. A value is valid until it is overwritten or removed.

pub mod keys;
pub mod manager;

pub use keys::CacheSlot;
pub use manager::{CacheRead, LocalCache};
