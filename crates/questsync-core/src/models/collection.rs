use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CollectionId;

/// A domain/rotation: the top-level grouping that owns one supertask tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub last_updated: DateTime<Utc>,
}

impl Collection {
    pub fn new(id: CollectionId, name: impl Into<String>, last_updated: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            last_updated,
        }
    }
}
