use crate::domain::app_config::QualtricsSettings;
use crate::domain::error::{AppError, Result};
use crate::domain::export_request::{
    ApiEnvelope, ExportCreationRequest, ExportProgress, ExportStarted, ExportStatus,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const API_TOKEN_HEADER: &str = "X-API-TOKEN";

/// Connection settings for the survey platform. Built once and shared; never
/// mutated after construction.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    api_token: String,
    base_url: Url,
    poll_interval: Duration,
    export_timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_token: &str, base_url: &str) -> Result<Self> {
        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let base_url = Url::parse(&base_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid API base URL {}: {}", base_url, e)))?;

        Ok(Self {
            api_token: api_token.to_string(),
            base_url,
            poll_interval: Duration::from_secs(1),
            export_timeout: Duration::from_secs(600),
        })
    }

    pub fn from_settings(settings: &QualtricsSettings, api_token: &str) -> Result<Self> {
        Ok(Self::new(api_token, &settings.base_url())?
            .with_poll_interval(settings.export.poll_interval())
            .with_export_timeout(settings.export.timeout()))
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_export_timeout(mut self, timeout: Duration) -> Self {
        self.export_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SingleResponse {
    values: serde_json::Map<String, serde_json::Value>,
}

/// Thin wrapper over the response export endpoints.
#[derive(Clone)]
pub struct QualtricsClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
}

impl QualtricsClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn endpoint(&self, survey_id: &str, path: &str) -> Result<Url> {
        self.config
            .base_url
            .join(path)
            .map_err(|e| AppError::fetch(survey_id, format!("Invalid endpoint {}: {}", path, e)))
    }

    async fn send(&self, survey_id: &str, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .header(API_TOKEN_HEADER, self.config.api_token.as_str())
            .send()
            .await
            .map_err(|e| AppError::fetch(survey_id, format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::fetch(
                survey_id,
                format!("API error ({}): {}", status, text),
            ));
        }
        Ok(response)
    }

    async fn result<T: DeserializeOwned>(&self, survey_id: &str, response: reqwest::Response) -> Result<T> {
        response
            .json::<ApiEnvelope<T>>()
            .await
            .map(|envelope| envelope.result)
            .map_err(|e| AppError::fetch(survey_id, format!("Failed to parse JSON: {}", e)))
    }

    pub async fn start_export(
        &self,
        survey_id: &str,
        request: &ExportCreationRequest,
    ) -> Result<ExportStarted> {
        let url = self.endpoint(survey_id, &format!("surveys/{}/export-responses", survey_id))?;
        let response = self.send(survey_id, self.http.post(url).json(request)).await?;
        self.result(survey_id, response).await
    }

    pub async fn export_progress(&self, survey_id: &str, progress_id: &str) -> Result<ExportProgress> {
        let url = self.endpoint(
            survey_id,
            &format!("surveys/{}/export-responses/{}", survey_id, progress_id),
        )?;
        let response = self.send(survey_id, self.http.get(url)).await?;
        self.result(survey_id, response).await
    }

    /// Polls until the export completes, fails, or the configured timeout
    /// elapses.
    pub async fn wait_for_export(&self, survey_id: &str, progress_id: &str) -> Result<ExportProgress> {
        let timeout = self.config.export_timeout;
        match tokio::time::timeout(timeout, self.poll_export(survey_id, progress_id)).await {
            Ok(progress) => progress,
            Err(_) => Err(AppError::fetch(
                survey_id,
                format!(
                    "Export {} did not complete within {}s",
                    progress_id,
                    timeout.as_secs()
                ),
            )),
        }
    }

    async fn poll_export(&self, survey_id: &str, progress_id: &str) -> Result<ExportProgress> {
        loop {
            let progress = self.export_progress(survey_id, progress_id).await?;
            match progress.status {
                ExportStatus::Complete => return Ok(progress),
                ExportStatus::Failed => {
                    return Err(AppError::fetch(
                        survey_id,
                        format!("Export {} failed", progress_id),
                    ))
                }
                ExportStatus::InProgress => {
                    debug!(survey_id, progress_id, percent = progress.percent_complete, "Export in progress");
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        }
    }

    /// Downloads a finished export and returns the file inside its archive.
    pub async fn download_export(&self, survey_id: &str, file_id: &str) -> Result<Vec<u8>> {
        let url = self.endpoint(
            survey_id,
            &format!("surveys/{}/export-responses/{}/file", survey_id, file_id),
        )?;
        let response = self.send(survey_id, self.http.get(url)).await?;
        let archive = response
            .bytes()
            .await
            .map_err(|e| AppError::fetch(survey_id, format!("Failed to download export: {}", e)))?;

        info!(survey_id, file_id, bytes = archive.len(), "Downloaded response export");
        extract_single_file(&archive).map_err(|e| AppError::fetch(survey_id, e.to_string()))
    }

    /// Start date of one response, used to anchor incremental exports.
    pub async fn response_start_date(&self, survey_id: &str, response_id: &str) -> Result<DateTime<Utc>> {
        let url = self.endpoint(
            survey_id,
            &format!("surveys/{}/responses/{}", survey_id, response_id),
        )?;
        let response = self.send(survey_id, self.http.get(url)).await?;
        let single: SingleResponse = self.result(survey_id, response).await?;

        let raw = single
            .values
            .get("startDate")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                AppError::fetch(survey_id, format!("Response {} has no startDate", response_id))
            })?;
        DateTime::parse_from_rfc3339(raw)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| AppError::fetch(survey_id, format!("Invalid startDate {}: {}", raw, e)))
    }

    /// Survey definition document in `.qsf` form.
    pub async fn survey_definition(&self, survey_id: &str) -> Result<serde_json::Value> {
        let mut url = self.endpoint(survey_id, &format!("survey-definitions/{}", survey_id))?;
        url.query_pairs_mut().append_pair("format", "qsf");
        let response = self.send(survey_id, self.http.get(url)).await?;
        self.result(survey_id, response).await
    }
}

/// Reads the single file of an export archive.
pub fn extract_single_file(archive: &[u8]) -> Result<Vec<u8>> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))
        .map_err(|e| AppError::ParseError(format!("Invalid export archive: {}", e)))?;
    if zip.len() != 1 {
        return Err(AppError::ParseError(format!(
            "Expected one file in export archive, found {}",
            zip.len()
        )));
    }

    let mut file = zip
        .by_index(0)
        .map_err(|e| AppError::ParseError(format!("Failed to open export file: {}", e)))?;
    let mut content = Vec::new();
    file.read_to_end(&mut content)?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn archive(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in files {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_extract_single_file() {
        let bytes = archive(&[("Survey.csv", "ResponseId\nR_1\n")]);
        assert_eq!(extract_single_file(&bytes).unwrap(), b"ResponseId\nR_1\n");
    }

    #[test]
    fn test_extract_rejects_bad_archives() {
        assert!(extract_single_file(b"not a zip").is_err());
        let two = archive(&[("a.csv", "x"), ("b.csv", "y")]);
        assert!(extract_single_file(&two).is_err());
    }

    #[test]
    fn test_endpoints_resolve_against_base() {
        let config = ClientConfig::new("token", "https://yul1.qualtrics.com/API/v3").unwrap();
        assert_eq!(config.base_url().as_str(), "https://yul1.qualtrics.com/API/v3/");

        let client = QualtricsClient::new(config);
        let url = client
            .endpoint("SV_1", "surveys/SV_1/export-responses/ES_9/file")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://yul1.qualtrics.com/API/v3/surveys/SV_1/export-responses/ES_9/file"
        );
    }
}
