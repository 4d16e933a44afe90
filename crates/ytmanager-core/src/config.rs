//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the
//! backend address, where the session token is kept, and the last email
//! used to log in.
//!
//! Configuration is stored at `~/.config/ytmanager/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_API_BASE_URL;
use crate::auth::claims::DEFAULT_EXPIRY_LEEWAY_SECS;
use crate::auth::{FileTokenStore, KeyringTokenStore, TokenStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "ytmanager";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable that overrides the configured backend address
pub const API_URL_ENV: &str = "YTMANAGER_API_URL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStoreKind {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub token_store: TokenStoreKind,
    pub expiry_leeway_secs: Option<i64>,
    pub last_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
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

    /// Backend address: command-line flag, then `YTMANAGER_API_URL`, then
    /// the config file, then the default.
    pub fn api_base_url(&self, flag: Option<&str>) -> String {
        let env = std::env::var(API_URL_ENV).ok();
        self.resolve_api_base_url(flag, env.as_deref())
    }

    fn resolve_api_base_url(&self, flag: Option<&str>, env: Option<&str>) -> String {
        [flag, env, self.api_base_url.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|url| !url.is_empty())
            .unwrap_or(DEFAULT_API_BASE_URL)
            .to_string()
    }

    pub fn expiry_leeway(&self) -> Duration {
        let secs = self.expiry_leeway_secs.unwrap_or(DEFAULT_EXPIRY_LEEWAY_SECS).max(0);
        Duration::try_seconds(secs).unwrap_or(Duration::MAX)
    }

    pub fn open_token_store(&self) -> Result<Box<dyn TokenStore>> {
        Ok(match self.token_store {
            TokenStoreKind::File => Box::new(FileTokenStore::new(self.cache_dir()?)),
            TokenStoreKind::Keyring => Box::new(KeyringTokenStore::default()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.api_base_url, None);
        assert_eq!(config.token_store, TokenStoreKind::File);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ytmanager").join("config.json");

        let config = Config {
            api_base_url: Some("https://api.example.com".to_string()),
            token_store: TokenStoreKind::Keyring,
            expiry_leeway_secs: Some(5),
            last_email: Some("ana@example.com".to_string()),
        };
        config.save_to(&path).unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.api_base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(reloaded.token_store, TokenStoreKind::Keyring);
        assert_eq!(reloaded.expiry_leeway(), Duration::seconds(5));
        assert_eq!(reloaded.last_email.as_deref(), Some("ana@example.com"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"token_store":"keyring"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.token_store, TokenStoreKind::Keyring);
        assert_eq!(config.expiry_leeway(), Duration::seconds(DEFAULT_EXPIRY_LEEWAY_SECS));
    }

    #[test]
    fn test_api_base_url_precedence() {
        let config = Config {
            api_base_url: Some("http://from-config".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_api_base_url(Some("http://from-flag"), Some("http://from-env")),
            "http://from-flag"
        );
        assert_eq!(
            config.resolve_api_base_url(None, Some("http://from-env")),
            "http://from-env"
        );
        assert_eq!(config.resolve_api_base_url(None, Some("  ")), "http://from-config");
        assert_eq!(
            Config::default().resolve_api_base_url(None, None),
            DEFAULT_API_BASE_URL
        );
    }

    #[test]
    fn test_negative_leeway_clamped() {
        let config = Config {
            expiry_leeway_secs: Some(-10),
            ..Default::default()
        };
        assert_eq!(config.expiry_leeway(), Duration::zero());
    }

    #[test]
    fn test_oversized_leeway_saturates() {
        let config = Config {
            expiry_leeway_secs: Some(i64::MAX),
            ..Default::default()
        };
        assert_eq!(config.expiry_leeway(), Duration::MAX);
    }
}
