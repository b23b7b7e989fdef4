use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

pub const DEFAULT_DATA_CENTER: &str = "yul1";
pub const DEFAULT_API_VERSION: &str = "v3";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub qualtrics: QualtricsSettings,
    #[serde(default)]
    pub sqlite: Option<SqliteSettings>,
    #[serde(default)]
    pub sheets: Option<SheetsSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QualtricsSettings {
    /// Falls back to the OS keyring when absent.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Survey id (`SV_...`) or any URL containing it.
    #[validate(length(min = 1))]
    pub survey_id: String,
    /// Local survey definition; downloaded when absent.
    #[serde(default)]
    pub codebook_path: Option<PathBuf>,
    #[serde(default = "default_data_center")]
    #[validate(length(min = 1))]
    pub data_center: String,
    #[serde(default = "default_api_version")]
    #[validate(length(min = 1))]
    pub api_version: String,
    #[serde(default)]
    #[validate(nested)]
    pub export: ExportSettings,
}

impl QualtricsSettings {
    pub fn base_url(&self) -> String {
        format!(
            "https://{}.qualtrics.com/API/{}/",
            self.data_center, self.api_version
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExportSettings {
    #[serde(default = "default_poll_interval_ms")]
    #[validate(range(min = 50))]
    pub poll_interval_ms: u64,
    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub filter_preview: bool,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_timeout_secs(),
            filter_preview: true,
            start_date: None,
            end_date: None,
        }
    }
}

impl ExportSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteSettings {
    pub url: String,
    #[serde(default)]
    pub table_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsSettings {
    pub directory: PathBuf,
    #[serde(default)]
    pub table_name: Option<String>,
}

fn default_data_center() -> String {
    DEFAULT_DATA_CENTER.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_true() -> bool {
    true
}
