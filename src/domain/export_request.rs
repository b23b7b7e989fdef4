use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
}

/// Body of a start-export call. Only fields set through the builder are
/// serialized; the platform applies its own defaults to the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportCreationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<ExportFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    use_labels: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    breakout_sets: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seen_unanswered_recode: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    multiselect_seen_unanswered_recode: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allow_continuation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    continuation_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort_by_last_modified_date: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    include_label_columns: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_instant"
    )]
    start_date: Option<DateTime<Utc>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_instant"
    )]
    end_date: Option<DateTime<Utc>>,
}

/// The export API wants second precision with a `Z` suffix.
fn serialize_instant<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(instant) => {
            serializer.serialize_str(&instant.to_rfc3339_opts(SecondsFormat::Secs, true))
        }
        None => serializer.serialize_none(),
    }
}

impl ExportCreationRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings every sync export uses: labelled CSV with seen-but-unanswered
    /// cells recoded to `-1` and rows ordered by modification date.
    pub fn for_sync() -> Self {
        Self::new()
            .format(ExportFormat::Csv)
            .use_labels(true)
            .breakout_sets(true)
            .seen_unanswered_recode(-1)
            .multiselect_seen_unanswered_recode(-1)
            .sort_by_last_modified_date(true)
            .include_label_columns(false)
    }

    pub fn format(mut self, format: ExportFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn use_labels(mut self, use_labels: bool) -> Self {
        self.use_labels = Some(use_labels);
        self
    }

    pub fn breakout_sets(mut self, breakout_sets: bool) -> Self {
        self.breakout_sets = Some(breakout_sets);
        self
    }

    pub fn seen_unanswered_recode(mut self, recode: i64) -> Self {
        self.seen_unanswered_recode = Some(recode);
        self
    }

    pub fn multiselect_seen_unanswered_recode(mut self, recode: i64) -> Self {
        self.multiselect_seen_unanswered_recode = Some(recode);
        self
    }

    pub fn allow_continuation(mut self, allow: bool) -> Self {
        self.allow_continuation = Some(allow);
        self
    }

    pub fn continuation_token(mut self, token: impl Into<String>) -> Self {
        self.continuation_token = Some(token.into());
        self
    }

    pub fn sort_by_last_modified_date(mut self, sort: bool) -> Self {
        self.sort_by_last_modified_date = Some(sort);
        self
    }

    pub fn include_label_columns(mut self, include: bool) -> Self {
        self.include_label_columns = Some(include);
        self
    }

    pub fn start_date(mut self, start: DateTime<Utc>) -> Self {
        self.start_date = Some(start);
        self
    }

    pub fn end_date(mut self, end: DateTime<Utc>) -> Self {
        self.end_date = Some(end);
        self
    }

    pub fn get_continuation_token(&self) -> Option<&str> {
        self.continuation_token.as_deref()
    }

    pub fn get_start_date(&self) -> Option<DateTime<Utc>> {
        self.start_date
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExportStatus {
    InProgress,
    Complete,
    Failed,
}

/// `result` of a poll-progress call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportProgress {
    #[serde(default)]
    pub percent_complete: f64,
    pub status: ExportStatus,
    pub file_id: Option<String>,
    pub continuation_token: Option<String>,
}

/// `result` of a start-export call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportStarted {
    pub progress_id: String,
    #[serde(default)]
    pub percent_complete: f64,
}

/// Envelope wrapping every API response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub result: T,
}
