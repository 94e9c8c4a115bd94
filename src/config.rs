use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ProxyError, Result};

pub const DEFAULT_PING_HOST: &str = "google.com";
pub const DEFAULT_PING_TIMEOUT_SECS: u64 = 3;

/// Settings stored in ~/.proxy-profiles/config.json
///
/// Every field is optional in the file; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host probed by the reachability check
    pub ping_host: String,

    /// Upper bound on a single reachability probe
    pub ping_timeout_secs: u64,

    /// Report HTTPS as active from the persisted address when the
    /// process environment has no HTTPS proxy variable
    pub https_follows_persisted: bool,

    /// Ask before replacing an already active proxy in direct mode
    pub confirm_replace: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ping_host: DEFAULT_PING_HOST.to_string(),
            ping_timeout_secs: DEFAULT_PING_TIMEOUT_SECS,
            https_follows_persisted: false,
            confirm_replace: true,
        }
    }
}

impl Config {
    /// Read config from file, returning defaults if the file doesn't exist
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ProxyError::storage(path, e))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_json::from_str(&content).map_err(|e| ProxyError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if config.ping_timeout_secs == 0 {
            return Err(ProxyError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: "ping_timeout_secs must be greater than zero".to_string(),
            });
        }

        Ok(config)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_read_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::read(&temp_dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.ping_host, "google.com");
        assert!(!config.https_follows_persisted);
    }

    #[test]
    fn test_config_partial_fields() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{"ping_host": "1.1.1.1", "ping_timeout_secs": 5}"#).unwrap();

        let config = Config::read(&path).unwrap();
        assert_eq!(config.ping_host, "1.1.1.1");
        assert_eq!(config.ping_timeout(), Duration::from_secs(5));
        assert!(config.confirm_replace);
    }

    #[test]
    fn test_config_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Config::read(&path).unwrap_err();
        assert!(matches!(err, ProxyError::ConfigInvalid { .. }));
    }

    #[test]
    fn test_config_zero_timeout_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{"ping_timeout_secs": 0}"#).unwrap();

        assert!(Config::read(&path).is_err());
    }
}
