use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One persisted status row. Rows are appended per sync attempt; the most
/// recent one is the current cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncCursor {
    pub source_id: String,
    pub timestamp: DateTime<Utc>,
    pub last_response_id: Option<String>,
    pub continuation_token: Option<String>,
    pub file_id: Option<String>,
}

impl SyncCursor {
    pub fn resume_point(&self) -> ResumePoint {
        ResumePoint::from_parts(
            self.last_response_id.as_deref(),
            self.continuation_token.as_deref(),
        )
    }
}

/// Where the next export starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumePoint {
    /// Rows strictly after this response.
    AfterResponse(String),
    /// Rows recorded or modified since the export that issued this token.
    Continuation(String),
    FullExport,
}

impl ResumePoint {
    /// The response id wins over the token; the token expires after a week
    /// and only resumes the export that produced it.
    pub fn from_parts(last_response_id: Option<&str>, continuation_token: Option<&str>) -> Self {
        fn non_empty(value: Option<&str>) -> Option<&str> {
            value.filter(|v| !v.trim().is_empty())
        }
        match (non_empty(last_response_id), non_empty(continuation_token)) {
            (Some(id), _) => ResumePoint::AfterResponse(id.to_string()),
            (None, Some(token)) => ResumePoint::Continuation(token.to_string()),
            (None, None) => ResumePoint::FullExport,
        }
    }

    pub fn from_cursor(cursor: Option<&SyncCursor>) -> Self {
        cursor
            .map(SyncCursor::resume_point)
            .unwrap_or(ResumePoint::FullExport)
    }

    pub fn last_response_id(&self) -> Option<&str> {
        match self {
            ResumePoint::AfterResponse(id) => Some(id),
            _ => None,
        }
    }

    pub fn continuation_token(&self) -> Option<&str> {
        match self {
            ResumePoint::Continuation(token) => Some(token),
            _ => None,
        }
    }
}
