use crate::domain::error::{AppError, Result};
use keyring::Entry;

pub const KEYRING_SERVICE: &str = "qualtrics-sync";

const API_TOKEN_ACCOUNT: &str = "api-token";

/// API token stored in the OS keyring, one entry per data center.
pub struct CredentialStore {
    service: String,
}

impl CredentialStore {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, data_center: &str) -> Result<Entry> {
        let account = format!("{}@{}", API_TOKEN_ACCOUNT, data_center);
        Entry::new(&self.service, &account)
            .map_err(|e| AppError::SecurityError(format!("Failed to open keyring entry: {}", e)))
    }

    pub fn save_api_token(&self, data_center: &str, token: &str) -> Result<()> {
        if token.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Refusing to store an empty API token".to_string(),
            ));
        }
        self.entry(data_center)?
            .set_password(token.trim())
            .map_err(|e| AppError::SecurityError(format!("Failed to store API token: {}", e)))
    }

    /// `Ok(None)` when no token was ever stored.
    pub fn api_token(&self, data_center: &str) -> Result<Option<String>> {
        match self.entry(data_center)?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AppError::SecurityError(format!(
                "Failed to read API token: {}",
                e
            ))),
        }
    }

    pub fn delete_api_token(&self, data_center: &str) -> Result<()> {
        match self.entry(data_center)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AppError::SecurityError(format!(
                "Failed to delete API token: {}",
                e
            ))),
        }
    }
}
