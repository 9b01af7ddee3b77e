//! Application configuration.
//!
//! The configuration is a YAML file. Every occurrence of `$app_dir$` is
//! replaced with the directory holding the file before parsing, so
//! paths can be written relative to the installation.

use crate::core::calendar::{BusinessCalendar, CalendarError};
use crate::report::org_chart::{OrgChart, User};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Placeholder for the configuration file's directory.
pub const APP_DIR_PLACEHOLDER: &str = "$app_dir$";

/// Errors arising from loading the application configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("configuration is malformed: {0}")]
    Syntax(#[from] serde_yaml::Error),
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Settings of the clearing run itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClearingSettings {
    pub rules_path: PathBuf,
    /// Holiday dates; year 9999 marks a holiday recurring every year.
    #[serde(default)]
    pub holidays: Vec<String>,
    /// Worker threads for scope processing; `None` uses every core.
    #[serde(default)]
    pub max_workers: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerSettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationSettings {
    #[serde(default)]
    pub users: Vec<User>,
}

/// The complete application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub clearing: ClearingSettings,
    pub ledger: LedgerSettings,
    #[serde(default)]
    pub notifications: NotificationSettings,
}

impl AppConfig {
    /// Read and parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let app_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::parse(&content, app_dir)
    }

    /// Parse configuration text, resolving `$app_dir$` against `app_dir`.
    pub fn parse(content: &str, app_dir: &Path) -> Result<Self, ConfigError> {
        let app_dir = app_dir.to_string_lossy().replace('\\', "/");
        let content = content.replace(APP_DIR_PLACEHOLDER, &app_dir);
        let config: AppConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.clearing.max_workers == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "clearing.max_workers",
                reason: "must be at least 1".to_string(),
            });
        }
        for user in &self.notifications.users {
            if user.email.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "notifications.users.email",
                    reason: format!("user {} has no email", user.full_name()),
                });
            }
        }
        Ok(())
    }

    /// Build the business calendar from the configured holidays.
    pub fn calendar(&self) -> Result<BusinessCalendar, CalendarError> {
        BusinessCalendar::from_entries(self.clearing.holidays.as_slice())
    }

    pub fn org_chart(&self) -> OrgChart {
        OrgChart::new(self.notifications.users.clone())
    }
}
