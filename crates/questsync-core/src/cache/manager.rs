use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::keys::{is_user_scoped, CacheSlot, OWNER_KEY};
use crate::models::UserId;
use crate::utils::{age_display, iso8601, parse_timestamp};

/// Result of reading a slot: either half may be missing.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    pub value: Option<T>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl<T> CacheRead<T> {
    pub fn empty() -> Self {
        Self {
            value: None,
            timestamp: None,
        }
    }

    /// Timestamp to send on a conditional fetch. Only offered when there is
    /// also a value to fall back on, so a 304 never leaves us with nothing.
    pub fn revalidation_timestamp(&self) -> Option<DateTime<Utc>> {
        self.value.as_ref().and(self.timestamp)
    }

    pub fn age_display(&self) -> Option<String> {
        self.timestamp.map(|ts| age_display(&ts, Utc::now()))
    }
}

/// Session-scoped key/value store.
///
/// Constructed once per session and shared by `Arc`. All state sits behind
/// one mutex, so each call observes and leaves a consistent store.
#[derive(Debug, Default)]
pub struct LocalCache {
    store: Mutex<HashMap<String, String>>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serialize `value` into the slot and stamp it with the current time.
    /// Returns the timestamp recorded.
    pub fn write<T: Serialize + ?Sized>(&self, slot: &CacheSlot, value: &T) -> Result<DateTime<Utc>> {
        self.write_at(slot, value, Utc::now())
    }

    pub(crate) fn write_at<T: Serialize + ?Sized>(
        &self,
        slot: &CacheSlot,
        value: &T,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        let contents = serde_json::to_string(value)
            .with_context(|| format!("Failed to serialize cache value: {}", slot.value_key))?;

        // Stored with millisecond precision, so stamp with that precision too
        let now = now.trunc_subsecs(3);
        let mut store = self.lock();

        // Never move a slot's timestamp backwards, even if the clock does
        let stamp = match store.get(&slot.timestamp_key).and_then(|s| parse_timestamp(s)) {
            Some(previous) if previous > now => previous,
            _ => now,
        };

        store.insert(slot.value_key.clone(), contents);
        store.insert(slot.timestamp_key.clone(), iso8601(&stamp));
        debug!(key = %slot.value_key, timestamp = %iso8601(&stamp), "Cache write");
        Ok(stamp)
    }

    /// Read a slot. A value that no longer parses is reported as absent.
    pub fn read<T: DeserializeOwned>(&self, slot: &CacheSlot) -> CacheRead<T> {
        let store = self.lock();

        let value = store.get(&slot.value_key).and_then(|contents| {
            match serde_json::from_str(contents) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key = %slot.value_key, error = %e, "Discarding unreadable cache value");
                    None
                }
            }
        });
        let timestamp = store
            .get(&slot.timestamp_key)
            .and_then(|s| parse_timestamp(s));

        debug!(key = %slot.value_key, hit = value.is_some(), "Cache read");
        CacheRead { value, timestamp }
    }

    pub fn remove(&self, slot: &CacheSlot) {
        let mut store = self.lock();
        store.remove(&slot.value_key);
        store.remove(&slot.timestamp_key);
    }

    /// Remove every key starting with `prefix`. Returns how many went.
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let mut store = self.lock();
        let before = store.len();
        store.retain(|k, _| !k.starts_with(prefix));
        before - store.len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    // ===== Ownership of user-scoped slots =====

    /// The user the task slots currently belong to.
    pub fn owner(&self) -> Option<UserId> {
        self.lock()
            .get(OWNER_KEY)
            .and_then(|s| s.parse().ok())
    }

    /// Make `user_id` the owner of the task slots.
    ///
    /// If someone else (or no one) owned them, every user-scoped key is
    /// purged before the marker is set. Returns true when that happened.
    pub fn claim_owner(&self, user_id: UserId) -> bool {
        let mut store = self.lock();
        let current = store.get(OWNER_KEY).and_then(|s| s.parse::<UserId>().ok());
        if current == Some(user_id) {
            return false;
        }

        store.retain(|k, _| !is_user_scoped(k));
        store.insert(OWNER_KEY.to_string(), user_id.to_string());
        debug!(previous = ?current, owner = user_id, "Task cache ownership changed");
        true
    }

    /// Drop the owner marker and every user-scoped key.
    pub fn release_owner(&self) {
        let mut store = self.lock();
        store.retain(|k, _| !is_user_scoped(k));
        store.remove(OWNER_KEY);
    }
}

// ============================================================================
// Tests
// ============================================================================
