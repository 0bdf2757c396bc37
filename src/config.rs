//! Configuration file support for the device registry.
//!
//! This module provides configuration file loading from TOML format,
//! allowing for easier deployment and configuration management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Devices stay approved for one year after registration.
pub const DEFAULT_VALIDITY_DAYS: u32 = 365;
const DEFAULT_MAX_DEVICE_ID_LEN: usize = 128;
const DEFAULT_MAX_METADATA_LEN: usize = 4096;
const DEFAULT_MAX_SUBMISSION_FILE_SIZE: u64 = 1024 * 1024;

/// Environment variable naming the config file used by the binaries.
pub const CONFIG_ENV_VAR: &str = "MSINGI_CONFIG";

/// Configuration for the registry, nullifier journal and file limits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub nullifiers: NullifierConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_validity_days")]
    pub validity_days: u32,
    #[serde(default = "default_store_file")]
    pub store_file: PathBuf,
    #[serde(default = "default_max_device_id_len")]
    pub max_device_id_len: usize,
    #[serde(default = "default_max_metadata_len")]
    pub max_metadata_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NullifierConfig {
    #[serde(default = "default_spent_file")]
    pub spent_file: PathBuf,
    #[serde(default = "default_enable_persistence")]
    pub enable_persistence: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_submission_file_size")]
    pub max_submission_file_size: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            validity_days: DEFAULT_VALIDITY_DAYS,
            store_file: default_store_file(),
            max_device_id_len: DEFAULT_MAX_DEVICE_ID_LEN,
            max_metadata_len: DEFAULT_MAX_METADATA_LEN,
        }
    }
}

impl Default for NullifierConfig {
    fn default() -> Self {
        Self {
            spent_file: default_spent_file(),
            enable_persistence: true,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_submission_file_size: DEFAULT_MAX_SUBMISSION_FILE_SIZE,
        }
    }
}

fn default_validity_days() -> u32 {
    DEFAULT_VALIDITY_DAYS
}

fn default_store_file() -> PathBuf {
    PathBuf::from("devices.jsonl")
}

fn default_max_device_id_len() -> usize {
    DEFAULT_MAX_DEVICE_ID_LEN
}

fn default_max_metadata_len() -> usize {
    DEFAULT_MAX_METADATA_LEN
}

fn default_spent_file() -> PathBuf {
    PathBuf::from("nullifiers.txt")
}

fn default_enable_persistence() -> bool {
    true
}

fn default_max_submission_file_size() -> u64 {
    DEFAULT_MAX_SUBMISSION_FILE_SIZE
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Loads `path` if given, otherwise falls back to defaults.
    ///
    /// A path that was given but cannot be loaded is an error.
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_file_or_default(path: &Path) -> Self {
        Self::load_from_file(path).unwrap_or_default()
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Rejects settings that would make every registration fail or expire at once.
    pub fn validate(&self) -> Result<()> {
        if self.registry.validity_days == 0 {
            return Err(anyhow::anyhow!("registry.validity_days must be at least 1"));
        }
        if self.registry.max_device_id_len == 0 {
            return Err(anyhow::anyhow!(
                "registry.max_device_id_len must be at least 1"
            ));
        }
        Ok(())
    }
}
