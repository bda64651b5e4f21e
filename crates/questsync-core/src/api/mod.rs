//! REST API access for the entry hierarchy and user completion state.
//!
//! `Backend` is the HTTP surface the sync engine and the task store talk
//! to. `ApiClient` implements it over reqwest; tests substitute an
//! in-memory server.
//!
//! Authentication is a bearer token supplied by the caller. How that token
//! was obtained or stored is outside this crate.

pub mod client;
pub mod error;

use chrono::{DateTime, Utc};

pub use client::ApiClient;
pub use error::ApiError;

use crate::models::{
    Collection, CollectionId, EntryId, EntryLevel, EntryStructure, UserId, UserTaskStructure,
};

/// Outcome of a conditional GET.
#[derive(Debug, Clone, PartialEq)]
pub enum Conditional<T> {
    /// 304: the copy identified by the sent timestamp is still current.
    NotModified,
    /// 2xx: the full current payload.
    Modified(T),
}

/// The server operations the client side relies on.
///
/// Implementations must not retry: a failure is reported once and the
/// caller decides what to do.
#[allow(async_fn_in_trait)]
pub trait Backend {
    async fn fetch_entries(
        &self,
        collection_id: CollectionId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Conditional<EntryStructure>, ApiError>;

    /// Create an entry and return the id the server assigned.
    /// `parent_id` is the supertask for a task and the task for a subtask.
    async fn create_entry(
        &self,
        level: EntryLevel,
        collection_id: CollectionId,
        parent_id: Option<EntryId>,
        title: &str,
    ) -> Result<EntryId, ApiError>;

    async fn update_entry(
        &self,
        level: EntryLevel,
        collection_id: CollectionId,
        entry_id: EntryId,
        title: &str,
    ) -> Result<(), ApiError>;

    async fn delete_entry(
        &self,
        level: EntryLevel,
        collection_id: CollectionId,
        entry_id: EntryId,
    ) -> Result<(), ApiError>;

    /// Completion records of the authenticated user.
    async fn fetch_own_tasks(
        &self,
        collection_id: CollectionId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Conditional<UserTaskStructure>, ApiError>;

    /// Completion records of another user (inspection, never cached).
    async fn fetch_user_tasks(
        &self,
        user_id: UserId,
        collection_id: CollectionId,
    ) -> Result<UserTaskStructure, ApiError>;

    /// Create a completion record and return its server-assigned id.
    async fn create_user_task(
        &self,
        collection_id: CollectionId,
        subtask_id: EntryId,
        is_completed: bool,
        comment: &str,
    ) -> Result<i64, ApiError>;

    async fn update_user_task(
        &self,
        record_id: i64,
        is_completed: bool,
        comment: &str,
    ) -> Result<(), ApiError>;

    async fn create_collection(&self, name: &str) -> Result<Collection, ApiError>;

    async fn delete_collection(&self, collection_id: CollectionId) -> Result<(), ApiError>;
}
