//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use wattboard_core::{ControllerConfig, DEFAULT_DEBOUNCE, DEFAULT_PAGE_SIZE};

use crate::cli::{ConfigKey, OutputFormat, parse_bool_arg};

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Backend base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Bearer token sent with every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Default institution id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,

    /// Rows per page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,

    /// Debounce delay for interactive sessions, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,

    /// Default output format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Disable colored output
    #[serde(default)]
    pub no_color: bool,
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wattboard")
            .join("config.toml")
    }

    /// Load config from the default location, or return default if not found
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from `path`, or return default if missing or unreadable
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    eprintln!("Warning: Failed to read config: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    /// Save config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Current value of `key`, rendered for display
    pub fn get(&self, key: ConfigKey) -> Option<String> {
        match key {
            ConfigKey::BaseUrl => self.base_url.clone(),
            ConfigKey::Token => self.token.as_ref().map(|_| "(set)".to_string()),
            ConfigKey::Institution => self.institution.clone(),
            ConfigKey::PageSize => self.page_size.map(|v| v.to_string()),
            ConfigKey::DebounceMs => self.debounce_ms.map(|v| v.to_string()),
            ConfigKey::Format => self.format.clone(),
            ConfigKey::NoColor => Some(self.no_color.to_string()),
        }
    }

    /// Validate and store `value` under `key`
    pub fn set(&mut self, key: ConfigKey, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            ConfigKey::BaseUrl => {
                if !value.starts_with("http://") && !value.starts_with("https://") {
                    bail!("Invalid URL '{}'. It must start with http:// or https://", value);
                }
                self.base_url = Some(value.trim_end_matches('/').to_string());
            }
            ConfigKey::Token => self.token = Some(value.to_string()),
            ConfigKey::Institution => self.institution = Some(value.to_string()),
            ConfigKey::PageSize => {
                let size: usize = value
                    .parse()
                    .ok()
                    .filter(|s| *s > 0)
                    .with_context(|| format!("Invalid page size '{}'. Use a positive number", value))?;
                self.page_size = Some(size);
            }
            ConfigKey::DebounceMs => {
                let ms: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid debounce '{}'. Use milliseconds", value))?;
                self.debounce_ms = Some(ms);
            }
            ConfigKey::Format => {
                let format = OutputFormat::from_config(value)
                    .with_context(|| format!("Invalid format '{}'. Use text, json, or csv", value))?;
                self.format = Some(format!("{:?}", format).to_lowercase());
            }
            ConfigKey::NoColor => {
                self.no_color = parse_bool_arg(value).map_err(anyhow::Error::msg)?;
            }
        }
        Ok(())
    }

    /// Reset `key` to its default
    pub fn unset(&mut self, key: ConfigKey) {
        match key {
            ConfigKey::BaseUrl => self.base_url = None,
            ConfigKey::Token => self.token = None,
            ConfigKey::Institution => self.institution = None,
            ConfigKey::PageSize => self.page_size = None,
            ConfigKey::DebounceMs => self.debounce_ms = None,
            ConfigKey::Format => self.format = None,
            ConfigKey::NoColor => self.no_color = false,
        }
    }

    /// Controller settings derived from this file
    pub fn controller_config(&self) -> Result<ControllerConfig> {
        let config = ControllerConfig::new()
            .page_size(self.page_size.unwrap_or(DEFAULT_PAGE_SIZE))
            .debounce(
                self.debounce_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_DEBOUNCE),
            );
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

/// Resolve the output format: `--json`, then the flag, then config, then text
pub fn resolve_format(flag: Option<OutputFormat>, json: bool, config: &Config) -> OutputFormat {
    if json {
        return OutputFormat::Json;
    }
    flag.or_else(|| config.format.as_deref().and_then(OutputFormat::from_config))
        .unwrap_or_default()
}

/// Resolve an institution from arg or env (already merged by clap), then config
pub fn resolve_institution(institution: Option<String>, config: &Config) -> Option<String> {
    institution
        .filter(|i| !i.trim().is_empty())
        .or_else(|| config.institution.clone())
}
