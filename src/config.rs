//! Configuration
//!
//! Persistent settings for the workflow connection, stored in
//! `~/.config/casegen/config.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`CASEGEN_API_KEY`, `DIFY_API_KEY`)
//! 2. Config file (`~/.config/casegen/config.toml`)
//! 3. Defaults

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CasegenError, Result};

fn default_base_url() -> String {
    "https://api.dify.ai".to_string()
}

fn default_user() -> String {
    "testcase-user".to_string()
}

fn default_result_field() -> String {
    "resultnew".to_string()
}

fn default_timeout_secs() -> u64 {
    600
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CasegenConfig {
    /// Workflow application API key (app-...)
    pub api_key: Option<String>,

    /// Workflow service base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Display label for the workflow
    pub workflow_name: Option<String>,

    /// End-user identifier forwarded with every request
    #[serde(default = "default_user")]
    pub user: String,

    /// Dotted path used to extract the result from workflow outputs
    #[serde(default = "default_result_field")]
    pub result_field: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CasegenConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            workflow_name: None,
            user: default_user(),
            result_field: default_result_field(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl CasegenConfig {
    /// Get the config directory path
    ///
    /// Returns `~/.config/casegen/` on Unix, `%APPDATA%/casegen/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("casegen")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file
    ///
    /// Returns default config if file doesn't exist.
    /// Returns error if file exists but is malformed.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| CasegenError::Config {
            reason: format!("Failed to read config file: {}", e),
        })?;

        toml::from_str(&content).map_err(|e| CasegenError::Config {
            reason: format!("Failed to parse config file: {}", e),
        })
    }

    /// Save configuration to file
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir();
        let path = Self::config_path();

        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| CasegenError::Config {
                reason: format!("Failed to create config directory: {}", e),
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| CasegenError::Config {
            reason: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(&path, content).map_err(|e| CasegenError::Config {
            reason: format!("Failed to write config file: {}", e),
        })?;

        Ok(())
    }

    /// Merge with environment variables
    ///
    /// Environment variables take precedence over config file values.
    pub fn with_env(mut self) -> Self {
        for var in ["CASEGEN_API_KEY", "DIFY_API_KEY"] {
            if let Ok(key) = std::env::var(var) {
                if !key.is_empty() {
                    self.api_key = Some(key);
                    break;
                }
            }
        }

        self
    }

    /// Get the effective API key
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

/// Mask an API key for display
///
/// Shows first N chars + asterisks, e.g. "app-3SnIRR***"
pub fn mask_api_key(key: &str, visible_chars: usize) -> String {
    if key.is_empty() {
        return String::new();
    }

    let visible = key
        .char_indices()
        .nth(visible_chars)
        .map_or(key.len(), |(i, _)| i);
    format!("{}***", &key[..visible])
}
