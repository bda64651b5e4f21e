use thiserror::Error;

use crate::api::ApiError;
use crate::models::{CollectionId, EntryId, EntryLevel};

/// Failure of a sync engine or task store operation.
///
/// Every variant means the same thing for local state: nothing changed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Entries for collection {0} have not been loaded")]
    NotLoaded(CollectionId),

    #[error("Tasks for collection {0} have not been loaded")]
    TasksNotLoaded(CollectionId),

    #[error("Unknown {level} {id} in collection {collection_id}")]
    UnknownEntry {
        level: EntryLevel,
        id: EntryId,
        collection_id: CollectionId,
    },

    #[error("No active user for this session")]
    NoActiveUser,
}

impl SyncError {
    /// Short text suitable for a user-facing notification.
    pub fn user_message(&self) -> &'static str {
        match self {
            SyncError::Api(e) => e.user_message(),
            SyncError::NoActiveUser => "You are not logged in.",
            _ => "That item is out of date. Refresh and try again.",
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
