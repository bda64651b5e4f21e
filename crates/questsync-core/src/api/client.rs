//! API client for the curriculum REST API.
//!
//! This module provides the `ApiClient` struct, which implements `Backend`
//! over reqwest with optional bearer-token authentication.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{header, Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use super::{ApiError, Backend, Conditional};
use crate::models::{
    Collection, CollectionId, EntryId, EntryLevel, EntryStructure, UserId, UserTaskStructure,
};
use crate::utils::iso8601;

// ============================================================================
// Constants
// ============================================================================

/// Default HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Query parameter carrying the entry cache timestamp.
const ENTRIES_TIMESTAMP_PARAM: &str = "entriesCacheTimestamp";

/// Query parameter carrying the task cache timestamp.
const TASKS_TIMESTAMP_PARAM: &str = "tasksCacheTimestamp";

// ============================================================================
// Request and response bodies
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EntryRequest<'a> {
    collection_id: CollectionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<EntryId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entry_id: Option<EntryId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateEntryResponse {
    entry_id: EntryId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserTaskRequest<'a> {
    subtask_id: EntryId,
    collection_id: CollectionId,
    is_completed: bool,
    comment: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserTaskRequest<'a> {
    id: i64,
    is_completed: bool,
    comment: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateUserTaskResponse {
    id: i64,
}

#[derive(Debug, Serialize)]
struct CreateCollectionRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCollectionResponse {
    collection_id: CollectionId,
    last_updated: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteCollectionRequest {
    collection_id: CollectionId,
}

// ============================================================================
// Client
// ============================================================================

/// API client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url` (scheme and host, no `/api`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(header::ACCEPT, "application/json");
        match self.token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response, url: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("{} from {}", e, url)))
    }

    /// GET with an optional freshness timestamp; 304 short-circuits the body.
    async fn get_conditional<T: DeserializeOwned>(
        &self,
        url: &str,
        param: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Conditional<T>, ApiError> {
        let mut builder = self.request(Method::GET, url);
        if let Some(ts) = since {
            builder = builder.query(&[(param, iso8601(&ts))]);
        }

        debug!(url = url, since = ?since, "Conditional GET");
        let response = builder.send().await?;

        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(Conditional::NotModified);
        }

        let response = Self::check_response(response).await?;
        Ok(Conditional::Modified(Self::parse(response, url).await?))
    }

    async fn send_json<B: Serialize>(
        &self,
        method: Method,
        url: &str,
        body: &B,
    ) -> Result<reqwest::Response, ApiError> {
        debug!(url = url, method = %method, "Sending request");
        let response = self.request(method, url).json(body).send().await?;
        Self::check_response(response).await
    }

    fn entry_url(level: EntryLevel, action: &str) -> String {
        format!("entries/{}/{}", level.path_segment(), action)
    }
}

impl Backend for ApiClient {
    async fn fetch_entries(
        &self,
        collection_id: CollectionId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Conditional<EntryStructure>, ApiError> {
        let url = self.url(&format!("entries/{}", collection_id));
        self.get_conditional(&url, ENTRIES_TIMESTAMP_PARAM, since).await
    }

    async fn create_entry(
        &self,
        level: EntryLevel,
        collection_id: CollectionId,
        parent_id: Option<EntryId>,
        title: &str,
    ) -> Result<EntryId, ApiError> {
        let url = self.url(&Self::entry_url(level, "create"));
        let body = EntryRequest {
            collection_id,
            title: Some(title),
            parent_id,
            entry_id: None,
        };
        let response = self.send_json(Method::POST, &url, &body).await?;
        let created: CreateEntryResponse = Self::parse(response, &url).await?;
        Ok(created.entry_id)
    }

    async fn update_entry(
        &self,
        level: EntryLevel,
        collection_id: CollectionId,
        entry_id: EntryId,
        title: &str,
    ) -> Result<(), ApiError> {
        let url = self.url(&Self::entry_url(level, "update"));
        let body = EntryRequest {
            collection_id,
            title: Some(title),
            parent_id: None,
            entry_id: Some(entry_id),
        };
        self.send_json(Method::PATCH, &url, &body).await?;
        Ok(())
    }

    async fn delete_entry(
        &self,
        level: EntryLevel,
        collection_id: CollectionId,
        entry_id: EntryId,
    ) -> Result<(), ApiError> {
        let url = self.url(&Self::entry_url(level, "delete"));
        let body = EntryRequest {
            collection_id,
            title: None,
            parent_id: None,
            entry_id: Some(entry_id),
        };
        self.send_json(Method::DELETE, &url, &body).await?;
        Ok(())
    }

    async fn fetch_own_tasks(
        &self,
        collection_id: CollectionId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Conditional<UserTaskStructure>, ApiError> {
        let url = self.url(&format!("tasks/{}", collection_id));
        self.get_conditional(&url, TASKS_TIMESTAMP_PARAM, since).await
    }

    async fn fetch_user_tasks(
        &self,
        user_id: UserId,
        collection_id: CollectionId,
    ) -> Result<UserTaskStructure, ApiError> {
        let url = self.url(&format!("tasks/{}/{}", user_id, collection_id));
        let response = self.request(Method::GET, &url).send().await?;
        let response = Self::check_response(response).await?;
        Self::parse(response, &url).await
    }

    async fn create_user_task(
        &self,
        collection_id: CollectionId,
        subtask_id: EntryId,
        is_completed: bool,
        comment: &str,
    ) -> Result<i64, ApiError> {
        let url = self.url("tasks/create");
        let body = CreateUserTaskRequest {
            subtask_id,
            collection_id,
            is_completed,
            comment,
        };
        let response = self.send_json(Method::POST, &url, &body).await?;
        let created: CreateUserTaskResponse = Self::parse(response, &url).await?;
        Ok(created.id)
    }

    async fn update_user_task(
        &self,
        record_id: i64,
        is_completed: bool,
        comment: &str,
    ) -> Result<(), ApiError> {
        let url = self.url("tasks/update");
        let body = UpdateUserTaskRequest {
            id: record_id,
            is_completed,
            comment,
        };
        self.send_json(Method::PATCH, &url, &body).await?;
        Ok(())
    }

    async fn create_collection(&self, name: &str) -> Result<Collection, ApiError> {
        let url = self.url("collections/create");
        let response = self
            .send_json(Method::POST, &url, &CreateCollectionRequest { name })
            .await?;
        let created: CreateCollectionResponse = Self::parse(response, &url).await?;
        Ok(Collection::new(created.collection_id, name, created.last_updated))
    }

    async fn delete_collection(&self, collection_id: CollectionId) -> Result<(), ApiError> {
        let url = self.url("collections/delete");
        self.send_json(Method::DELETE, &url, &DeleteCollectionRequest { collection_id })
            .await?;
        Ok(())
    }
}
