//! Configuration file structure
//!
//! ```json
//! {
//!   "store":    { "kind": "couch", "url": "http://localhost:5984", "database": "conflicts" },
//!   "scenario": { "base_body": { "count": 0 }, "branches": 2, "steps": 1 }
//! }
//! ```
//!
//! `store` is optional and defaults to the in-memory store.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::errors::{CliError, CliResult};
use crate::forge::{BranchMode, ConflictScenario};
use crate::store::{Body, CouchConfig, CouchDocumentStore, DocumentStore, MemoryDocumentStore};

/// Which `DocumentStore` to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    Couch,
}

/// `store` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSection {
    #[serde(default)]
    pub kind: StoreKind,

    /// Server root (couch only, default "http://localhost:5984")
    #[serde(default = "default_url")]
    pub url: String,

    /// Database name (required for couch)
    #[serde(default)]
    pub database: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Per-request timeout in seconds (default 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            url: default_url(),
            database: None,
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// `scenario` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSection {
    #[serde(default)]
    pub base_id: Option<String>,

    #[serde(default)]
    pub base_body: Body,

    /// Ordinary updates before diverging (default 0)
    #[serde(default)]
    pub advance: u32,

    /// Number of divergent branches (default 2)
    #[serde(default = "default_branches")]
    pub branches: usize,

    /// Generations fabricated per branch (default 1)
    #[serde(default = "default_steps")]
    pub steps: u64,

    #[serde(default)]
    pub concurrent: bool,

    #[serde(default)]
    pub expected_leaf_count: Option<usize>,
}

fn default_url() -> String {
    "http://localhost:5984".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_branches() -> usize {
    2
}
fn default_steps() -> u64 {
    1
}

/// Configuration file root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreSection,

    pub scenario: ScenarioSection,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.store.kind == StoreKind::Couch {
            match self.store.database.as_deref() {
                Some(db) if !db.is_empty() => {}
                _ => {
                    return Err(CliError::config_error(
                        "store.database is required when store.kind is 'couch'",
                    ))
                }
            }
            if self.store.timeout_secs == 0 {
                return Err(CliError::config_error("store.timeout_secs must be > 0"));
            }
        }

        if self.scenario.branches == 0 {
            return Err(CliError::config_error("scenario.branches must be > 0"));
        }
        if self.scenario.expected_leaf_count == Some(0) {
            return Err(CliError::config_error(
                "scenario.expected_leaf_count must be > 0",
            ));
        }

        Ok(())
    }

    /// Scenario described by the `scenario` section.
    pub fn to_scenario(&self) -> ConflictScenario {
        let section = &self.scenario;
        let mut scenario = ConflictScenario::new(section.base_body.clone())
            .with_advance(section.advance)
            .with_branches(section.branches, section.steps);

        if let Some(id) = &section.base_id {
            scenario = scenario.with_base_id(id.clone());
        }
        if let Some(count) = section.expected_leaf_count {
            scenario = scenario.expecting_leaves(count);
        }
        if section.concurrent {
            scenario.mode = BranchMode::Concurrent;
        }
        scenario
    }

    /// Store described by the `store` section.
    pub fn build_store(&self) -> CliResult<Arc<dyn DocumentStore>> {
        match self.store.kind {
            StoreKind::Memory => Ok(Arc::new(MemoryDocumentStore::new())),
            StoreKind::Couch => {
                let database = self.store.database.clone().ok_or_else(|| {
                    CliError::config_error("store.database is required when store.kind is 'couch'")
                })?;
                let couch = CouchConfig {
                    url: self.store.url.clone(),
                    database,
                    username: self.store.username.clone(),
                    password: self.store.password.clone(),
                    timeout_secs: self.store.timeout_secs,
                };
                let store = CouchDocumentStore::new(couch)
                    .map_err(|e| CliError::store_error(e.to_string()))?;
                Ok(Arc::new(store))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, value: serde_json::Value) -> std::path::PathBuf {
        let path = dir.path().join("revforge.json");
        fs::write(&path, value.to_string()).unwrap();
        path
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, json!({ "scenario": {} }));

        let config = Config::load(&path).unwrap();
        assert_eq!(config.store.kind, StoreKind::Memory);
        assert_eq!(config.scenario.branches, 2);
        assert_eq!(config.scenario.steps, 1);
        assert_eq!(config.scenario.advance, 0);
        assert!(!config.scenario.concurrent);
    }

    #[test]
    fn test_to_scenario() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            json!({
                "scenario": {
                    "base_id": "foo",
                    "base_body": { "count": 0 },
                    "branches": 3,
                    "steps": 2,
                    "concurrent": true,
                    "expected_leaf_count": 3
                }
            }),
        );

        let scenario = Config::load(&path).unwrap().to_scenario();
        assert_eq!(scenario.base_id.as_deref(), Some("foo"));
        assert_eq!(scenario.base_body["count"], 0);
        assert_eq!(scenario.branches.len(), 3);
        assert!(scenario.branches.iter().all(|b| b.steps == 2));
        assert_eq!(scenario.mode, BranchMode::Concurrent);
        assert_eq!(scenario.expected_leaf_count, Some(3));
    }

    #[test]
    fn test_couch_requires_database() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            json!({ "store": { "kind": "couch" }, "scenario": {} }),
        );

        let err = Config::load(&path).unwrap_err();
        assert_eq!(err.code_str(), "REVFORGE_CLI_CONFIG_ERROR");
        assert!(err.message().contains("store.database"));
    }

    #[test]
    fn test_couch_store_builds() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            json!({
                "store": { "kind": "couch", "database": "conflicts", "url": "http://127.0.0.1:5984" },
                "scenario": {}
            }),
        );

        let config = Config::load(&path).unwrap();
        let store = config.build_store().unwrap();
        assert!(store.capabilities().trusts_declared_ancestry);
    }

    #[test]
    fn test_zero_branches_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, json!({ "scenario": { "branches": 0 } }));
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_missing_scenario_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, json!({ "store": { "kind": "memory" } }));
        assert!(Config::load(&path)
            .unwrap_err()
            .message()
            .contains("Invalid config JSON"));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.message().contains("Failed to read config"));
    }
}
