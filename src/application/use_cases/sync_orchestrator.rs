// ============================================================
// INCREMENTAL SYNC
// ============================================================
// One pass of: read cursor -> fetch -> transform -> ensure destination ->
// write rows -> write cursor. The destination and cursor store are borrowed
// from the caller and never closed here.

use crate::domain::error::{Result, SyncStep};
use crate::domain::response_batch::ResponseBatch;
use crate::domain::sync_cursor::{ResumePoint, SyncCursor};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// Caller-supplied reshaping applied to every fetched batch.
pub type ResponsePostProcessor =
    Arc<dyn Fn(ResponseBatch) -> Result<ResponseBatch> + Send + Sync>;

pub fn identity_post_processor() -> ResponsePostProcessor {
    Arc::new(|batch: ResponseBatch| Ok(batch))
}

/// A batch of new responses and the source's view of where it ended.
#[derive(Debug, Clone)]
pub struct FetchedBatch {
    pub batch: ResponseBatch,
    pub last_response_id: Option<String>,
    pub continuation_token: Option<String>,
    pub file_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Source of response rows. Implementations must return only rows after the
/// resume point.
#[async_trait]
pub trait ResponseFetcher: Send + Sync {
    async fn fetch(&self, survey_id: &str, resume: &ResumePoint) -> Result<FetchedBatch>;
}

/// Append-only history of sync cursors per source.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Most recent cursor, or `None` when the source never synced.
    async fn read_cursor(&self, source_id: &str) -> Result<Option<SyncCursor>>;

    async fn append_cursor(&self, cursor: &SyncCursor) -> Result<()>;
}

/// Columns available in the responses store after `ensure_schema`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationSchema {
    pub columns: Vec<String>,
    /// The store was created by this call.
    pub created: bool,
}

#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// Creates the responses and status stores if missing, typing new
    /// columns from `sample`. An existing schema is returned unchanged.
    async fn ensure_schema(&self, source_id: &str, sample: &ResponseBatch)
        -> Result<DestinationSchema>;

    /// Appends every row of `batch`. Existing rows are never touched.
    async fn append_rows(&self, source_id: &str, batch: &ResponseBatch) -> Result<u64>;

    /// Drops the responses and status stores of `source_id`.
    async fn reset(&self, source_id: &str) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Drop existing stores first so the run performs a full export.
    pub restart: bool,
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub survey_id: String,
    pub rows_fetched: usize,
    pub rows_written: u64,
    pub columns_dropped: Vec<String>,
    pub schema_created: bool,
    pub fetched_at: DateTime<Utc>,
    pub cursor: SyncCursor,
}

pub struct SyncOrchestrator<'a> {
    fetcher: &'a dyn ResponseFetcher,
    cursors: &'a dyn CursorStore,
    destination: &'a dyn DestinationStore,
    post_process: ResponsePostProcessor,
    options: SyncOptions,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(
        fetcher: &'a dyn ResponseFetcher,
        cursors: &'a dyn CursorStore,
        destination: &'a dyn DestinationStore,
    ) -> Self {
        Self {
            fetcher,
            cursors,
            destination,
            post_process: identity_post_processor(),
            options: SyncOptions::default(),
        }
    }

    pub fn with_post_processor(mut self, post_process: ResponsePostProcessor) -> Self {
        self.post_process = post_process;
        self
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Runs one sync cycle for `survey_id`.
    ///
    /// Errors carry the survey id and the failing step. Only a failed cursor
    /// read is tolerated: it is logged and treated as a first run.
    #[tracing::instrument(level = "info", skip(self), fields(restart = self.options.restart))]
    pub async fn sync(&self, survey_id: &str) -> Result<SyncReport> {
        if self.options.restart {
            self.destination
                .reset(survey_id)
                .await
                .map_err(|e| e.at_step(survey_id, SyncStep::EnsureDestination))?;
            info!(survey_id, "Dropped existing responses and status stores");
        }

        let previous = match self.cursors.read_cursor(survey_id).await {
            Ok(cursor) => cursor,
            Err(err) => {
                warn!(survey_id, error = %err, "Could not read sync cursor, starting from scratch");
                None
            }
        };
        let resume = ResumePoint::from_cursor(previous.as_ref());

        let fetched = self
            .fetcher
            .fetch(survey_id, &resume)
            .await
            .map_err(|e| e.at_step(survey_id, SyncStep::FetchBatch))?;
        let rows_fetched = fetched.batch.len();

        let last_response_id = if fetched.batch.is_empty() {
            previous.as_ref().and_then(|c| c.last_response_id.clone())
        } else {
            fetched
                .last_response_id
                .clone()
                .or_else(|| fetched.batch.last_response_id().map(str::to_string))
        };
        let continuation_token = fetched
            .continuation_token
            .clone()
            .or_else(|| previous.as_ref().and_then(|c| c.continuation_token.clone()));

        let mut rows_written = 0;
        let mut columns_dropped = Vec::new();
        let mut schema_created = false;

        if fetched.batch.is_empty() {
            info!(survey_id, ?resume, "No new responses");
        } else {
            let mut batch = (self.post_process)(fetched.batch)
                .map_err(|e| e.at_step(survey_id, SyncStep::Transform))?;

            let schema = self
                .destination
                .ensure_schema(survey_id, &batch)
                .await
                .map_err(|e| e.at_step(survey_id, SyncStep::EnsureDestination))?;
            schema_created = schema.created;

            columns_dropped = batch.retain_columns(|column| schema.columns.iter().any(|c| c == column));
            if !columns_dropped.is_empty() {
                warn!(
                    survey_id,
                    columns = ?columns_dropped,
                    "Dropping columns missing from the existing destination schema"
                );
            }

            rows_written = self
                .destination
                .append_rows(survey_id, &batch)
                .await
                .map_err(|e| e.at_step(survey_id, SyncStep::WriteRows))?;
        }

        let cursor = SyncCursor {
            source_id: survey_id.to_string(),
            timestamp: Utc::now(),
            last_response_id,
            continuation_token,
            file_id: fetched.file_id,
        };
        self.cursors
            .append_cursor(&cursor)
            .await
            .map_err(|e| e.at_step(survey_id, SyncStep::WriteCursor))?;

        info!(
            survey_id,
            rows_fetched,
            rows_written,
            last_response_id = cursor.last_response_id.as_deref().unwrap_or(""),
            "Sync complete"
        );

        Ok(SyncReport {
            survey_id: survey_id.to_string(),
            rows_fetched,
            rows_written,
            columns_dropped,
            schema_created,
            fetched_at: fetched.timestamp,
            cursor,
        })
    }
}
