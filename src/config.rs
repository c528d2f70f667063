//! Configuration Management
//!
//! Handles persistent configuration storage for eks-addons.

use crate::aws::regions::get_default_region;
use crate::pipeline::driver::{DEFAULT_HYDRATE_CONCURRENCY, DEFAULT_MAX_CONCURRENCY};
use crate::pipeline::policy::{CallPolicy, DEFAULT_CALL_TIMEOUT, DEFAULT_MAX_RETRIES, RETRY_BASE_DELAY};
use crate::resource::DEFAULT_IGNORE_CODES;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Region used when nothing else is configured
pub const FALLBACK_REGION: &str = "us-east-1";

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_hydrate_concurrency() -> usize {
    DEFAULT_HYDRATE_CONCURRENCY
}

fn default_call_timeout_secs() -> u64 {
    DEFAULT_CALL_TIMEOUT.as_secs()
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

/// User configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Regions evaluated when the query does not name any
    #[serde(default)]
    pub regions: Vec<String>,
    /// EKS endpoint template, `{region}` is substituted
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Error codes that mean "add-on is gone"; unset keeps the built-in list
    #[serde(default)]
    pub ignore_error_codes: Option<Vec<String>>,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_hydrate_concurrency")]
    pub hydrate_concurrency: usize,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            regions: Vec::new(),
            endpoint: None,
            ignore_error_codes: None,
            max_concurrency: default_max_concurrency(),
            hydrate_concurrency: default_hydrate_concurrency(),
            call_timeout_secs: default_call_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("eks-addons").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from `path`; a missing or unreadable file yields the defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;

        Ok(())
    }

    /// Regions to fan out over (config > AWS_REGION > fallback)
    pub fn effective_regions(&self) -> Vec<String> {
        if !self.regions.is_empty() {
            return self.regions.clone();
        }
        vec![get_default_region().unwrap_or_else(|| FALLBACK_REGION.to_string())]
    }

    pub fn effective_ignore_codes(&self) -> Vec<String> {
        match &self.ignore_error_codes {
            Some(codes) => codes.clone(),
            None => DEFAULT_IGNORE_CODES.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_secs(self.call_timeout_secs.max(1)),
            max_retries: self.max_retries,
            base_delay: RETRY_BASE_DELAY,
        }
    }

    /// Set regions and save
    pub fn set_regions(&mut self, regions: Vec<String>) -> Result<()> {
        self.regions = regions;
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.json"));
        assert_eq!(config, Config::default());
        assert_eq!(config.max_concurrency, DEFAULT_MAX_CONCURRENCY);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"regions": ["eu-west-1"], "max_retries": 0}"#).unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.effective_regions(), vec!["eu-west-1".to_string()]);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.call_timeout_secs, DEFAULT_CALL_TIMEOUT.as_secs());
        assert_eq!(config.call_policy().max_retries, 0);
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            regions: vec!["us-west-2".into()],
            endpoint: Some("http://localhost:4566".into()),
            ignore_error_codes: Some(vec!["ResourceNotFoundException".into()]),
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
    }

    #[test]
    fn test_ignore_codes_default_and_override() {
        let config = Config::default();
        assert_eq!(config.effective_ignore_codes().len(), DEFAULT_IGNORE_CODES.len());

        let config = Config {
            ignore_error_codes: Some(vec![]),
            ..Config::default()
        };
        assert!(config.effective_ignore_codes().is_empty());
    }
}
