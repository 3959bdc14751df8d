// Storage configuration: which database, which version, where it lives

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_NAME: &str = "cost-manager";
pub const DEFAULT_VERSION: u32 = 2;
pub const DEFAULT_FILE: &str = "cost-manager.db";
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageLocation {
    File(PathBuf),
    Memory,
}

/// `{"name": ..., "version": ..., "location": {"file": "..."} | "memory", "busyTimeoutMs": ...}`.
/// Every field is optional in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageConfig {
    pub name: String,
    pub version: u32,
    pub location: StorageLocation,
    /// How long a file session waits on another connection's lock.
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            version: DEFAULT_VERSION,
            location: StorageLocation::File(PathBuf::from(DEFAULT_FILE)),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl StorageConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: StorageConfig =
            serde_json::from_str(&raw).context("Failed to parse storage config")?;
        Ok(config)
    }

    pub fn in_memory(mut self) -> Self {
        self.location = StorageLocation::Memory;
        self
    }

    pub fn at_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = StorageLocation::File(path.into());
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.name, "cost-manager");
        assert_eq!(config.version, 2);
        assert_eq!(config.location, StorageLocation::File(PathBuf::from("cost-manager.db")));
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_load_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, r#"{"location": "memory", "version": 3}"#).unwrap();

        let config = StorageConfig::load(&path).unwrap();
        assert_eq!(config.name, DEFAULT_NAME);
        assert_eq!(config.version, 3);
        assert_eq!(config.location, StorageLocation::Memory);

        std::fs::write(&path, r#"{"location": {"file": "/tmp/costs.db"}, "busyTimeoutMs": 250}"#).unwrap();
        let config = StorageConfig::load(&path).unwrap();
        assert_eq!(config.location, StorageLocation::File(PathBuf::from("/tmp/costs.db")));
        assert_eq!(config.busy_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(StorageConfig::load(&path).is_err());
        assert!(StorageConfig::load(&dir.path().join("missing.json")).is_err());
    }
}
