//! Configuration management for proforma-tools.
//!
//! Handles loading and saving configuration from TOML files. Config files are
//! stored in platform-specific locations:
//!
//! - **macOS/Linux**: `~/.config/proforma-tools/config.toml`
//! - **Windows**: `%APPDATA%\proforma-tools\config.toml`
//!
//! The API token is deliberately not part of the config file; it is read from
//! the `JIRA_API_TOKEN` environment variable by the CLI.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// Config file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config directory name.
const CONFIG_DIR_NAME: &str = "proforma-tools";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Jira instance configuration (rank endpoint, legacy properties API)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jira: Option<JiraConfig>,

    /// Forms REST API configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forms: Option<FormsConfig>,
}

/// Jira instance configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraConfig {
    /// Jira instance URL (e.g. `https://company.atlassian.net`)
    pub url: String,
    /// User email for basic auth
    pub email: String,
}

/// Forms REST API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormsConfig {
    /// Atlassian Cloud tenant id, scopes the Forms API base URL
    pub cloud_id: String,
}

impl Config {
    /// Get the configuration directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join(CONFIG_DIR_NAME))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
    }

    /// Get the configuration file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from the default location.
    ///
    /// Returns a default (empty) config if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// Returns a default (empty) config if the file doesn't exist.
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            debug!(path = ?path, "Config file does not exist, using defaults");
            return Ok(Self::default());
        }

        debug!(path = ?path, "Loading config");

        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

        info!(path = ?path, "Config loaded successfully");
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
        }

        debug!(path = ?path, "Saving config");

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        info!(path = ?path, "Config saved successfully");
        Ok(())
    }

    /// Set a configuration value by key path.
    ///
    /// Key format: `section.field` (e.g. `jira.url`, `forms.cloud_id`)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.len() != 2 {
            return Err(Error::Config(format!(
                "Invalid config key '{}'. Expected format: section.field",
                key
            )));
        }

        let (section, field) = (parts[0], parts[1]);

        match section {
            "jira" => {
                let config = self.jira.get_or_insert_with(|| JiraConfig {
                    url: String::new(),
                    email: String::new(),
                });
                match field {
                    "url" => config.url = value.to_string(),
                    "email" => config.email = value.to_string(),
                    _ => {
                        return Err(Error::Config(format!("Unknown Jira config field: {}", field)))
                    }
                }
            }
            "forms" => {
                let config = self.forms.get_or_insert_with(|| FormsConfig {
                    cloud_id: String::new(),
                });
                match field {
                    "cloud_id" => config.cloud_id = value.to_string(),
                    _ => {
                        return Err(Error::Config(format!(
                            "Unknown Forms config field: {}",
                            field
                        )))
                    }
                }
            }
            _ => {
                return Err(Error::Config(format!("Unknown config section: {}", section)));
            }
        }

        Ok(())
    }

    /// Get a configuration value by key path.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.len() != 2 {
            return Err(Error::Config(format!(
                "Invalid config key '{}'. Expected format: section.field",
                key
            )));
        }

        let (section, field) = (parts[0], parts[1]);

        match section {
            "jira" => {
                let Some(config) = &self.jira else {
                    return Ok(None);
                };
                match field {
                    "url" => Ok(Some(config.url.clone())),
                    "email" => Ok(Some(config.email.clone())),
                    _ => Err(Error::Config(format!("Unknown Jira config field: {}", field))),
                }
            }
            "forms" => {
                let Some(config) = &self.forms else {
                    return Ok(None);
                };
                match field {
                    "cloud_id" => Ok(Some(config.cloud_id.clone())),
                    _ => Err(Error::Config(format!(
                        "Unknown Forms config field: {}",
                        field
                    ))),
                }
            }
            _ => Err(Error::Config(format!("Unknown config section: {}", section))),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
