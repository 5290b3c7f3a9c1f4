use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub sheet: SheetConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetConfig {
    /// Target spreadsheet id (the long id from the sheet URL)
    #[serde(default)]
    pub spreadsheet_id: String,
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            sheet_name: default_sheet_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FilterConfig {
    /// Keep only messages whose subject contains this keyword
    /// (case-insensitive). Empty or absent means keep everything.
    #[serde(default)]
    pub subject_keyword: Option<String>,
    /// Skip automated senders ("no-reply" / "noreply" addresses)
    #[serde(default)]
    pub exclude_no_reply: bool,
    /// Restrict the Gmail query to messages newer than one day
    #[serde(default)]
    pub last_day_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_secs: default_base_delay_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Rows per sub-batch when a full append fails
    #[serde(default = "default_sub_batch_size")]
    pub sub_batch_size: usize,
    /// Maximum characters per exported field
    #[serde(default = "default_max_field_chars")]
    pub max_field_chars: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            sub_batch_size: default_sub_batch_size(),
            max_field_chars: default_max_field_chars(),
        }
    }
}

fn default_sheet_name() -> String {
    "Emails".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_secs() -> u64 {
    1
}

fn default_sub_batch_size() -> usize {
    50
}

fn default_max_field_chars() -> usize {
    crate::truncate::MAX_FIELD_CHARS
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            let mut config = Self::default();
            config.apply_env();
            return Ok(config);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SyncError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let mut config: Self = toml::from_str(&content)
            .map_err(|e| SyncError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.apply_env();

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Environment variables override file values, so deployments can inject
    /// the spreadsheet id without editing the config on disk.
    pub fn apply_env(&mut self) {
        if let Ok(id) = std::env::var("SPREADSHEET_ID") {
            if !id.is_empty() {
                self.sheet.spreadsheet_id = id;
            }
        }
        if let Ok(name) = std::env::var("SHEET_NAME") {
            if !name.is_empty() {
                self.sheet.sheet_name = name;
            }
        }
        if let Ok(keyword) = std::env::var("SUBJECT_FILTER") {
            if !keyword.is_empty() {
                self.filter.subject_keyword = Some(keyword);
            }
        }
        if let Ok(flag) = std::env::var("EXCLUDE_NO_REPLY") {
            self.filter.exclude_no_reply = matches!(
                flag.to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        if let Ok(flag) = std::env::var("LAST_24_HOURS_ONLY") {
            self.filter.last_day_only = matches!(
                flag.to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                SyncError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| SyncError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| SyncError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.sheet.spreadsheet_id.is_empty() {
            return Err(SyncError::ConfigError(
                "sheet.spreadsheet_id is required (set it in the config file or via SPREADSHEET_ID)"
                    .to_string(),
            ));
        }

        if self.sheet.sheet_name.is_empty() {
            return Err(SyncError::ConfigError(
                "sheet.sheet_name cannot be empty".to_string(),
            ));
        }

        if self.export.sub_batch_size == 0 {
            return Err(SyncError::ConfigError(
                "export.sub_batch_size must be at least 1".to_string(),
            ));
        }

        // A field limit at or above the 50,000-char cell ceiling defeats
        // the point of truncating
        if self.export.max_field_chars == 0 || self.export.max_field_chars >= 50_000 {
            return Err(SyncError::ConfigError(
                "export.max_field_chars must be between 1 and 49999".to_string(),
            ));
        }

        if self.retry.max_retries > 10 {
            return Err(SyncError::ConfigError(
                "retry.max_retries cannot exceed 10".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let mut config = Self::default();
        config.sheet.spreadsheet_id = "your-spreadsheet-id-here".to_string();
        config.save(path).await
    }
}
