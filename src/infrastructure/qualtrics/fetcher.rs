use super::client::QualtricsClient;
use crate::application::use_cases::sync_orchestrator::{FetchedBatch, ResponseFetcher};
use crate::domain::app_config::ExportSettings;
use crate::domain::error::{AppError, Result};
use crate::domain::export_request::ExportCreationRequest;
use crate::domain::response_batch::ResponseBatch;
use crate::domain::sync_cursor::ResumePoint;
use crate::infrastructure::csv::export_parser::ExportCsvParser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Response fetcher backed by the export API.
pub struct QualtricsResponseFetcher {
    client: QualtricsClient,
    parser: ExportCsvParser,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
}

impl QualtricsResponseFetcher {
    pub fn new(client: QualtricsClient) -> Self {
        Self {
            client,
            parser: ExportCsvParser::new(),
            start_date: None,
            end_date: None,
        }
    }

    pub fn with_export_settings(mut self, settings: &ExportSettings) -> Self {
        self.parser = ExportCsvParser::new().with_filter_preview(settings.filter_preview);
        self.start_date = settings.start_date;
        self.end_date = settings.end_date;
        self
    }

    /// Export request for `resume`, plus the response the export is anchored
    /// on when resuming after a known response.
    async fn build_request(
        &self,
        survey_id: &str,
        resume: &ResumePoint,
    ) -> Result<(ExportCreationRequest, Option<String>)> {
        let mut request = ExportCreationRequest::for_sync();
        if let Some(end) = self.end_date {
            request = request.end_date(end);
        }

        let anchor = match resume {
            ResumePoint::AfterResponse(response_id) => {
                let start = self
                    .client
                    .response_start_date(survey_id, response_id)
                    .await?;
                request = request.start_date(start);
                Some(response_id.clone())
            }
            ResumePoint::Continuation(token) => {
                request = request.allow_continuation(true).continuation_token(token.clone());
                None
            }
            ResumePoint::FullExport => {
                if let Some(start) = self.start_date {
                    request = request.start_date(start);
                }
                request = request.allow_continuation(true);
                None
            }
        };
        Ok((request, anchor))
    }
}

/// Drops the anchor response and every row before it.
///
/// The start-date filter is inclusive and rows are ordered by modification
/// date, so the anchor and the rows synced ahead of it come back with the
/// export. Returns the number of rows removed; a batch without the anchor is
/// left as is.
pub fn drop_through_anchor(batch: &mut ResponseBatch, anchor: &str) -> usize {
    let Some(position) = batch
        .rows()
        .iter()
        .position(|row| row.response_id == anchor)
    else {
        return 0;
    };

    let mut index = 0;
    batch.retain_rows(|_| {
        let keep = index > position;
        index += 1;
        keep
    });
    position + 1
}

#[async_trait]
impl ResponseFetcher for QualtricsResponseFetcher {
    async fn fetch(&self, survey_id: &str, resume: &ResumePoint) -> Result<FetchedBatch> {
        let (request, anchor) = self.build_request(survey_id, resume).await?;

        let started = self.client.start_export(survey_id, &request).await?;
        let progress = self
            .client
            .wait_for_export(survey_id, &started.progress_id)
            .await?;
        let file_id = progress
            .file_id
            .clone()
            .ok_or_else(|| AppError::fetch(survey_id, "Completed export has no fileId"))?;

        let content = self.client.download_export(survey_id, &file_id).await?;
        let mut batch = self
            .parser
            .parse_bytes(&content)
            .map_err(|e| AppError::fetch(survey_id, e.to_string()))?;

        if let Some(anchor) = anchor.as_deref() {
            let removed = drop_through_anchor(&mut batch, anchor);
            debug!(survey_id, anchor, removed, "Dropped rows already synced");
        }

        info!(survey_id, file_id = %file_id, rows = batch.len(), "Fetched responses");
        Ok(FetchedBatch {
            last_response_id: batch.last_response_id().map(str::to_string),
            continuation_token: progress.continuation_token,
            file_id: Some(file_id),
            timestamp: Utc::now(),
            batch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::response_batch::CellValue;
    use crate::infrastructure::qualtrics::client::ClientConfig;

    fn fetcher() -> QualtricsResponseFetcher {
        let config = ClientConfig::new("token", "https://yul1.qualtrics.com/API/v3/").unwrap();
        QualtricsResponseFetcher::new(QualtricsClient::new(config))
    }

    #[tokio::test]
    async fn test_continuation_request() {
        let (request, anchor) = fetcher()
            .build_request("SV_1", &ResumePoint::Continuation("tok".to_string()))
            .await
            .unwrap();
        assert!(anchor.is_none());
        assert_eq!(request.get_continuation_token(), Some("tok"));

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["allowContinuation"], true);
        assert!(body.get("startDate").is_none());
    }

    #[tokio::test]
    async fn test_full_export_uses_configured_window() {
        let settings = ExportSettings {
            start_date: Some(Utc::now()),
            ..Default::default()
        };
        let (request, _) = fetcher()
            .with_export_settings(&settings)
            .build_request("SV_1", &ResumePoint::FullExport)
            .await
            .unwrap();
        assert_eq!(request.get_start_date(), settings.start_date);
        assert!(request.get_continuation_token().is_none());
    }

    fn batch_of(ids: &[&str]) -> ResponseBatch {
        let mut batch = ResponseBatch::new("ResponseId", vec!["Q1".to_string()]);
        for id in ids {
            batch.push_row(*id, vec![CellValue::Int(1)]).unwrap();
        }
        batch
    }

    fn ids(batch: &ResponseBatch) -> Vec<&str> {
        batch.rows().iter().map(|r| r.response_id.as_str()).collect()
    }

    #[test]
    fn test_rows_through_anchor_removed() {
        let mut batch = batch_of(&["R_0", "R_1", "R_2"]);
        assert_eq!(drop_through_anchor(&mut batch, "R_1"), 2);
        assert_eq!(ids(&batch), vec!["R_2"]);

        let mut last = batch_of(&["R_0", "R_1"]);
        assert_eq!(drop_through_anchor(&mut last, "R_1"), 2);
        assert!(last.is_empty());
    }

    #[test]
    fn test_missing_anchor_keeps_batch() {
        let mut batch = batch_of(&["R_3", "R_4"]);
        assert_eq!(drop_through_anchor(&mut batch, "R_1"), 0);
        assert_eq!(ids(&batch), vec!["R_3", "R_4"]);
    }
}
