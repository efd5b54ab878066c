//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: API
//! location, timeouts, which token store to use, and the last email used
//! to sign in.
//!
//! Configuration is stored at `~/.config/lorley/config.json`. The
//! `LORLEY_API_URL` and `LORLEY_TOKEN_STORE` environment variables override
//! the file.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::transport::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::api::AccountKind;
use crate::auth::manager::DEFAULT_REFRESH_TIMEOUT_SECS;
use crate::auth::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, SessionOptions, TokenStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "lorley";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Where the credential pair is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStoreKind {
    #[default]
    File,
    Keyring,
    Memory,
}

impl FromStr for TokenStoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(TokenStoreKind::File),
            "keyring" | "keychain" => Ok(TokenStoreKind::Keyring),
            "memory" => Ok(TokenStoreKind::Memory),
            other => Err(anyhow::anyhow!("Unknown token store: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub refresh_timeout_secs: u64,
    pub token_store: TokenStoreKind,
    pub account_kind: AccountKind,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            refresh_timeout_secs: DEFAULT_REFRESH_TIMEOUT_SECS,
            token_store: TokenStoreKind::default(),
            account_kind: AccountKind::default(),
            last_email: None,
        }
    }
}

impl Config {
    /// Load from disk (defaults when absent), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("LORLEY_API_URL").filter(|v| !v.trim().is_empty()) {
            self.api_url = url;
        }
        if let Some(store) = lookup("LORLEY_TOKEN_STORE").filter(|v| !v.trim().is_empty()) {
            self.token_store = store.parse().context("Invalid LORLEY_TOKEN_STORE")?;
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn session_options(&self, account: AccountKind) -> SessionOptions {
        SessionOptions {
            account,
            refresh_timeout: Duration::from_secs(self.refresh_timeout_secs),
        }
    }

    /// Open the configured token store. Business and user sessions are kept
    /// apart so signing in as one never clobbers the other.
    pub fn token_store(&self, account: AccountKind) -> Result<Arc<dyn TokenStore>> {
        Ok(match self.token_store {
            TokenStoreKind::File => Arc::new(FileTokenStore::new(self.cache_dir()?.join(account.as_str()))),
            TokenStoreKind::Keyring => Arc::new(KeyringTokenStore::new(account.as_str())),
            TokenStoreKind::Memory => Arc::new(MemoryTokenStore::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.refresh_timeout_secs, 15);
        assert_eq!(config.token_store, TokenStoreKind::File);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            api_url: "https://api.lorley.example".into(),
            account_kind: AccountKind::Business,
            last_email: Some("a@b.com".into()),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_url, "https://api.lorley.example");
        assert_eq!(loaded.account_kind, AccountKind::Business);
        assert_eq!(loaded.last_email.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"token_store": "keyring"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.token_store, TokenStoreKind::Keyring);
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(|key| match key {
                "LORLEY_API_URL" => Some("https://staging.lorley.example".into()),
                "LORLEY_TOKEN_STORE" => Some("memory".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.api_url, "https://staging.lorley.example");
        assert_eq!(config.token_store, TokenStoreKind::Memory);

        assert!(config
            .apply_env(|key| (key == "LORLEY_TOKEN_STORE").then(|| "floppy".to_string()))
            .is_err());
    }

    #[test]
    fn test_session_options_from_config() {
        let config = Config {
            refresh_timeout_secs: 5,
            ..Config::default()
        };
        let options = config.session_options(AccountKind::Business);
        assert_eq!(options.account, AccountKind::Business);
        assert_eq!(options.refresh_timeout, Duration::from_secs(5));
    }
}
