//! Studio configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//!
//! | Variable | Default |
//! |---|---|
//! | `STUDIO_DB_PATH` | `studio.db` |
//! | `STUDIO_DB_MAX_CONNECTIONS` | `5` |
//! | `STUDIO_MEDIA_BASE_URL` | unset (no `file_url` in media views) |

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::pool::DbConfig;

/// Process-level settings for the studio data layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudioConfig {
    /// SQLite database file
    pub db_path: PathBuf,

    /// Pool size
    pub db_max_connections: u32,

    /// Prefix for media file URLs, e.g. `https://cdn.example.com/media`
    pub media_base_url: Option<String>,
}

impl StudioConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_max_connections: u32 = lookup("STUDIO_DB_MAX_CONNECTIONS")
            .unwrap_or_else(|| "5".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("STUDIO_DB_MAX_CONNECTIONS".to_string()))?;

        if db_max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "STUDIO_DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        let db_path = lookup("STUDIO_DB_PATH")
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| "studio.db".to_string());

        let media_base_url = match lookup("STUDIO_MEDIA_BASE_URL") {
            Some(url) if url.trim().is_empty() => None,
            Some(url) if url.starts_with("http://") || url.starts_with("https://") || url.starts_with('/') => {
                Some(url.trim_end_matches('/').to_string())
            }
            Some(_) => return Err(ConfigError::InvalidValue("STUDIO_MEDIA_BASE_URL".to_string())),
            None => None,
        };

        Ok(StudioConfig {
            db_path: PathBuf::from(db_path),
            db_max_connections,
            media_base_url,
        })
    }

    /// Pool configuration derived from these settings.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.db_path.clone())
            .max_connections(self.db_max_connections)
            .media_base_url(self.media_base_url.clone())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = StudioConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.db_path, PathBuf::from("studio.db"));
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.media_base_url, None);
    }

    #[test]
    fn test_overrides() {
        let config = StudioConfig::from_lookup(lookup(&[
            ("STUDIO_DB_PATH", "/var/lib/studio/inventory.db"),
            ("STUDIO_DB_MAX_CONNECTIONS", "8"),
            ("STUDIO_MEDIA_BASE_URL", "https://cdn.example.com/media/"),
        ]))
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/var/lib/studio/inventory.db"));
        assert_eq!(config.db_max_connections, 8);
        assert_eq!(
            config.media_base_url.as_deref(),
            Some("https://cdn.example.com/media")
        );

        let db = config.db_config();
        assert_eq!(db.max_connections, 8);
    }

    #[test]
    fn test_invalid_values() {
        assert!(StudioConfig::from_lookup(lookup(&[("STUDIO_DB_MAX_CONNECTIONS", "many")])).is_err());
        assert!(StudioConfig::from_lookup(lookup(&[("STUDIO_DB_MAX_CONNECTIONS", "0")])).is_err());
        assert!(StudioConfig::from_lookup(lookup(&[("STUDIO_MEDIA_BASE_URL", "cdn")])).is_err());
    }
}
