use std::fmt;

/// Named stages of one sync cycle, carried by [`AppError::SyncStep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    ReadCursor,
    FetchBatch,
    Transform,
    EnsureDestination,
    WriteRows,
    WriteCursor,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStep::ReadCursor => "read_cursor",
            SyncStep::FetchBatch => "fetch_batch",
            SyncStep::Transform => "transform",
            SyncStep::EnsureDestination => "ensure_destination",
            SyncStep::WriteRows => "write_rows",
            SyncStep::WriteCursor => "write_cursor",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug)]
pub enum AppError {
    Internal(String),
    NotFound(String),
    ValidationError(String),
    ParseError(String),
    MalformedDefinition(String),
    FetchError {
        survey_id: String,
        reason: String,
    },
    SyncStep {
        survey_id: String,
        step: SyncStep,
        source: Box<AppError>,
    },
    SecurityError(String),
    DatabaseError(String),
    ConfigError(String),
    IoError(String),
}

impl AppError {
    pub fn fetch(survey_id: &str, reason: impl Into<String>) -> Self {
        AppError::FetchError {
            survey_id: survey_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn at_step(self, survey_id: &str, step: SyncStep) -> Self {
        AppError::SyncStep {
            survey_id: survey_id.to_string(),
            step,
            source: Box::new(self),
        }
    }

    /// The failing sync step, if this error came out of the orchestrator.
    pub fn step(&self) -> Option<SyncStep> {
        match self {
            AppError::SyncStep { step, .. } => Some(*step),
            _ => None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            AppError::MalformedDefinition(msg) => {
                write!(f, "Malformed survey definition: {}", msg)
            }
            AppError::FetchError { survey_id, reason } => {
                write!(f, "Fetch failed for survey {}: {}", survey_id, reason)
            }
            AppError::SyncStep {
                survey_id,
                step,
                source,
            } => write!(
                f,
                "Sync of survey {} failed at step {}: {}",
                survey_id, step, source
            ),
            AppError::SecurityError(msg) => write!(f, "Security error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Config error: {}", msg),
            AppError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::SyncStep { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ParseError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
