//! Client configuration.
//!
//! Holds the API base URL, request timeout, bearer token and the id of the
//! user the token belongs to. Stored at `~/.config/questsync/config.json`;
//! `QUESTSYNC_API_URL`, `QUESTSYNC_TOKEN` and `QUESTSYNC_USER_ID` override
//! the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::DEFAULT_TIMEOUT_SECS;
use crate::models::UserId;

/// Application name used for the config directory path
const APP_NAME: &str = "questsync";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_URL: &str = "http://localhost:8000";

pub const ENV_API_URL: &str = "QUESTSYNC_API_URL";
pub const ENV_TOKEN: &str = "QUESTSYNC_TOKEN";
pub const ENV_USER_ID: &str = "QUESTSYNC_USER_ID";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub token: Option<String>,
    pub user_id: Option<UserId>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            token: None,
            user_id: None,
        }
    }
}

impl Config {
    /// Load the config file (defaults if missing), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Self::from_json(&contents).with_context(|| format!("Invalid config in {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply overrides from `lookup`, which maps an env var name to its value.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|s| !s.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|s| !s.is_empty()) {
            self.token = Some(token);
        }
        if let Some(raw) = lookup(ENV_USER_ID).filter(|s| !s.is_empty()) {
            let user_id = raw
                .trim()
                .parse::<UserId>()
                .with_context(|| format!("{} is not a user id: {}", ENV_USER_ID, raw))?;
            self.user_id = Some(user_id);
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = Config::from_json(r#"{"token": "abc"}"#).unwrap();

        assert_eq!(config.api_base_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert_eq!(config.user_id, None);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config::from_json(r#"{"api_base_url": "https://a.example", "user_id": 3}"#).unwrap();

        config
            .apply_overrides(env(&[
                (ENV_API_URL, "https://b.example"),
                (ENV_USER_ID, " 7 "),
            ]))
            .unwrap();

        assert_eq!(config.api_base_url, "https://b.example");
        assert_eq!(config.user_id, Some(7));
        assert_eq!(config.token, None);
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = Config::default();

        config.apply_overrides(env(&[(ENV_TOKEN, "")])).unwrap();

        assert_eq!(config.token, None);
    }

    #[test]
    fn test_bad_user_id_is_an_error() {
        let mut config = Config::default();

        let err = config
            .apply_overrides(env(&[(ENV_USER_ID, "seven")]))
            .unwrap_err();

        assert!(err.to_string().contains(ENV_USER_ID));
    }
}
