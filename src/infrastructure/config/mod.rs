use crate::domain::app_config::{AppConfig, QualtricsSettings};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::security::credentials::{CredentialStore, KEYRING_SERVICE};
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use std::path::Path;
use tracing::debug;
use url::Url;
use validator::Validate;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Environment overrides, e.g. `QUALTRICS_SYNC_QUALTRICS__SURVEY_ID`.
pub const ENV_PREFIX: &str = "QUALTRICS_SYNC_";

const SURVEY_ID_PREFIX: &str = "SV_";

pub struct ConfigService {
    credentials: CredentialStore,
}

impl ConfigService {
    pub fn new() -> Self {
        Self {
            credentials: CredentialStore::new(KEYRING_SERVICE),
        }
    }

    /// Loads `path` (a missing file contributes nothing) overlaid with
    /// prefixed environment variables, then validates the result.
    pub fn load(path: &Path) -> Result<AppConfig> {
        let figment = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<AppConfig> {
        let mut config: AppConfig = figment
            .extract()
            .map_err(|e| AppError::ConfigError(format!("Failed to load configuration: {}", e)))?;

        config
            .validate()
            .map_err(|e| AppError::ConfigError(format!("Invalid configuration: {}", e)))?;

        config.qualtrics.survey_id = normalize_survey_id(&config.qualtrics.survey_id)?;
        debug!(survey_id = %config.qualtrics.survey_id, "Loaded configuration");
        Ok(config)
    }

    /// Configured token if non-empty, otherwise the keyring entry.
    pub fn resolve_api_token(&self, settings: &QualtricsSettings) -> Result<String> {
        if let Some(token) = settings
            .api_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            return Ok(token.to_string());
        }

        self.credentials
            .api_token(&settings.data_center)?
            .ok_or_else(|| {
                AppError::SecurityError(format!(
                    "No API token configured and none stored in the keyring for {}",
                    settings.data_center
                ))
            })
    }

    pub fn save_api_token(&self, data_center: &str, token: &str) -> Result<()> {
        self.credentials.save_api_token(data_center, token)
    }

    pub fn delete_api_token(&self, data_center: &str) -> Result<()> {
        self.credentials.delete_api_token(data_center)
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}

/// Accepts a bare survey id or a URL carrying one in its path or query.
pub fn normalize_survey_id(input: &str) -> Result<String> {
    let input = input.trim();
    if input.starts_with(SURVEY_ID_PREFIX) {
        return Ok(input.to_string());
    }

    let Ok(url) = Url::parse(input) else {
        return Ok(input.to_string());
    };

    let from_path = url
        .path_segments()
        .into_iter()
        .flatten()
        .find(|segment| segment.starts_with(SURVEY_ID_PREFIX))
        .map(str::to_string);
    let from_query = || {
        url.query_pairs()
            .map(|(_, value)| value.into_owned())
            .find(|value| value.starts_with(SURVEY_ID_PREFIX))
    };

    from_path.or_else(from_query).ok_or_else(|| {
        AppError::ConfigError(format!("No survey id ({}...) found in {}", SURVEY_ID_PREFIX, input))
    })
}
