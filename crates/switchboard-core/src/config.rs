use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::{CoreError, CoreErrorKind};

pub const DEFAULT_MAX_WORKERS: usize = 4;
pub const DEFAULT_RECENCY_HALF_LIFE_SECS: u64 = 7 * 24 * 60 * 60;
pub const DEFAULT_RECALL_LIMIT: usize = 10;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Upper bound on agent executions running at the same time.
    pub max_workers: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

impl CoordinatorConfig {
    pub fn with_max_workers(max_workers: usize) -> Self {
        Self { max_workers }
    }

    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        let config: Self = serde_json::from_str(raw).map_err(|error| {
            CoreError::new(
                CoreErrorKind::InvalidInput,
                format!("invalid coordinator config: {error}"),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_workers == 0 {
            return Err(CoreError::new(
                CoreErrorKind::InvalidInput,
                "max_workers must be at least 1",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub database_path: PathBuf,
    pub recency_half_life_secs: u64,
    pub default_recall_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("switchboard.sqlite3"),
            recency_half_life_secs: DEFAULT_RECENCY_HALF_LIFE_SECS,
            default_recall_limit: DEFAULT_RECALL_LIMIT,
        }
    }
}

impl MemoryConfig {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Self::default()
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        let config: Self = serde_json::from_str(raw).map_err(|error| {
            CoreError::new(
                CoreErrorKind::InvalidInput,
                format!("invalid memory config: {error}"),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(CoreError::new(
                CoreErrorKind::InvalidInput,
                "database_path must not be empty",
            ));
        }
        if self.recency_half_life_secs == 0 {
            return Err(CoreError::new(
                CoreErrorKind::InvalidInput,
                "recency_half_life_secs must be positive",
            ));
        }
        Ok(())
    }

    pub fn recency_half_life(&self) -> Duration {
        Duration::from_secs(self.recency_half_life_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::{CoordinatorConfig, DEFAULT_RECALL_LIMIT, MemoryConfig};
    use crate::models::CoreErrorKind;

    #[test]
    fn partial_memory_config_falls_back_to_defaults() {
        let config = MemoryConfig::from_json(r#"{"database_path": "/tmp/memories.db"}"#).unwrap();
        assert_eq!(config.database_path.to_str(), Some("/tmp/memories.db"));
        assert_eq!(config.default_recall_limit, DEFAULT_RECALL_LIMIT);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let error = CoordinatorConfig::from_json(r#"{"max_workers": 0}"#).unwrap_err();
        assert_eq!(error.kind, CoreErrorKind::InvalidInput);
    }
}
