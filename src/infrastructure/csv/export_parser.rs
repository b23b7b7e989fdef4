// ============================================================
// EXPORT CSV PARSER
// ============================================================
// Turns a survey response export (CSV) into a ResponseBatch

use crate::domain::error::{AppError, Result};
use crate::domain::response_batch::{CellValue, ResponseBatch};
use csv::{ReaderBuilder, StringRecord, Trim};
use encoding_rs::UTF_8;
use tracing::debug;

pub const RESPONSE_ID_COLUMN: &str = "ResponseId";
pub const STATUS_COLUMN: &str = "Status";
pub const PREVIEW_STATUS: &str = "Survey Preview";

/// Seen-but-unanswered recode requested on every export.
pub const SEEN_UNANSWERED_RECODE: &str = "-1";

/// Parser for response exports.
///
/// The export carries two descriptive rows under the header (question text
/// and import ids); they are skipped.
pub struct ExportCsvParser {
    /// Column holding the row key
    id_column: String,

    /// Rows after the header that describe columns rather than responses
    label_rows: usize,

    /// Cell values read as null in addition to blanks
    null_tokens: Vec<String>,

    /// Drop responses recorded through the survey preview
    filter_preview: bool,
}

impl Default for ExportCsvParser {
    fn default() -> Self {
        Self {
            id_column: RESPONSE_ID_COLUMN.to_string(),
            label_rows: 2,
            null_tokens: vec![SEEN_UNANSWERED_RECODE.to_string()],
            filter_preview: true,
        }
    }
}

impl ExportCsvParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label_rows(mut self, label_rows: usize) -> Self {
        self.label_rows = label_rows;
        self
    }

    pub fn with_filter_preview(mut self, filter_preview: bool) -> Self {
        self.filter_preview = filter_preview;
        self
    }

    /// Parse raw export bytes, dropping a UTF-8 byte order mark
    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<ResponseBatch> {
        let (content, had_errors) = UTF_8.decode_with_bom_removal(bytes);
        if had_errors {
            debug!("Export contained invalid UTF-8, replaced with U+FFFD");
        }
        self.parse_content(&content)
    }

    /// Parse CSV content from string
    pub fn parse_content(&self, content: &str) -> Result<ResponseBatch> {
        let mut reader = ReaderBuilder::new()
            .trim(Trim::Headers)
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| AppError::ParseError(format!("Failed to read export headers: {}", e)))?
            .clone();

        let id_index = headers
            .iter()
            .position(|h| h == self.id_column)
            .ok_or_else(|| {
                AppError::ParseError(format!("Export has no {} column", self.id_column))
            })?;
        let status_index = headers.iter().position(|h| h == STATUS_COLUMN);

        let columns: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != id_index)
            .map(|(_, h)| h.to_string())
            .collect();
        let mut batch = ResponseBatch::new(self.id_column.clone(), columns);

        let mut previews = 0;
        for (index, result) in reader.records().enumerate() {
            let record = result.map_err(|e| {
                AppError::ParseError(format!("Failed to parse export row {}: {}", index + 1, e))
            })?;
            if index < self.label_rows {
                continue;
            }

            if self.filter_preview
                && status_index.and_then(|idx| record.get(idx)).map(str::trim) == Some(PREVIEW_STATUS)
            {
                previews += 1;
                continue;
            }

            let response_id = record.get(id_index).unwrap_or("").trim();
            if response_id.is_empty() {
                return Err(AppError::ParseError(format!(
                    "Export row {} has no {}",
                    index + 1,
                    self.id_column
                )));
            }

            let cells = self.parse_cells(&headers, &record, id_index);
            batch.push_row(response_id, cells)?;
        }

        debug!(rows = batch.len(), previews, "Parsed response export");
        Ok(batch)
    }

    fn parse_cells(&self, headers: &StringRecord, record: &StringRecord, id_index: usize) -> Vec<CellValue> {
        (0..headers.len())
            .filter(|idx| *idx != id_index)
            .map(|idx| {
                let raw = record.get(idx).unwrap_or("");
                if self.null_tokens.iter().any(|token| token == raw.trim()) {
                    CellValue::Null
                } else {
                    CellValue::parse(raw)
                }
            })
            .collect()
    }
}
