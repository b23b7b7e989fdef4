use crate::application::use_cases::sync_orchestrator::{
    CursorStore, DestinationSchema, DestinationStore,
};
use crate::domain::error::{AppError, Result};
use crate::domain::response_batch::ResponseBatch;
use crate::domain::store_names::StoreNames;
use crate::domain::sync_cursor::SyncCursor;
use crate::infrastructure::storage::{ensure_workbook_dir, remove_if_exists, sheet_path};
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const STATUS_HEADER: [&str; 5] = [
    "source_id",
    "timestamp",
    "last_response_id",
    "continuation_token",
    "file_id",
];

/// Workbook kept as a directory of CSV sheets: one for responses and one
/// for sync status per survey.
pub struct WorkbookDestination {
    directory: PathBuf,
    table_name: Option<String>,
}

impl WorkbookDestination {
    pub fn open(directory: &Path) -> Result<Self> {
        let directory = ensure_workbook_dir(directory)?;
        Ok(Self {
            directory,
            table_name: None,
        })
    }

    pub fn with_table_name(mut self, table_name: Option<String>) -> Self {
        self.table_name = table_name;
        self
    }

    fn sheets(&self, source_id: &str) -> (PathBuf, PathBuf) {
        let names = StoreNames::new(source_id, self.table_name.as_deref());
        (
            sheet_path(&self.directory, &names.responses),
            sheet_path(&self.directory, &names.status),
        )
    }
}

fn csv_error(path: &Path, e: csv::Error) -> AppError {
    AppError::IoError(format!("Sheet {}: {}", path.display(), e))
}

fn read_header(path: &Path) -> Result<Option<Vec<String>>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;
    let header = reader.headers().map_err(|e| csv_error(path, e))?;
    Ok(Some(header.iter().map(str::to_string).collect()))
}

fn create_sheet<I, S>(path: &Path, header: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    let mut writer = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
    writer.write_record(header).map_err(|e| csv_error(path, e))?;
    writer.flush()?;
    Ok(())
}

fn append_writer(path: &Path) -> Result<csv::Writer<File>> {
    let file = OpenOptions::new().append(true).open(path)?;
    Ok(csv::WriterBuilder::new().has_headers(false).from_writer(file))
}

fn ensure_status_sheet(path: &Path) -> Result<()> {
    if !path.exists() {
        create_sheet(path, STATUS_HEADER)?;
    }
    Ok(())
}

#[async_trait]
impl CursorStore for WorkbookDestination {
    async fn read_cursor(&self, source_id: &str) -> Result<Option<SyncCursor>> {
        let (_, status) = self.sheets(source_id);
        if !status.exists() {
            return Ok(None);
        }

        let mut reader = csv::Reader::from_path(&status).map_err(|e| csv_error(&status, e))?;
        let mut latest = None;
        for record in reader.deserialize::<SyncCursor>() {
            latest = Some(record.map_err(|e| csv_error(&status, e))?);
        }
        Ok(latest)
    }

    async fn append_cursor(&self, cursor: &SyncCursor) -> Result<()> {
        let (_, status) = self.sheets(&cursor.source_id);
        ensure_status_sheet(&status)?;

        let mut writer = append_writer(&status)?;
        writer.serialize(cursor).map_err(|e| csv_error(&status, e))?;
        writer.flush()?;
        Ok(())
    }
}

#[async_trait]
impl DestinationStore for WorkbookDestination {
    async fn ensure_schema(
        &self,
        source_id: &str,
        sample: &ResponseBatch,
    ) -> Result<DestinationSchema> {
        let (responses, status) = self.sheets(source_id);
        ensure_status_sheet(&status)?;

        let id_column = sample.id_column();
        if let Some(header) = read_header(&responses)? {
            return Ok(DestinationSchema {
                columns: header.into_iter().filter(|c| c != id_column).collect(),
                created: false,
            });
        }

        let columns: Vec<String> = sample
            .columns()
            .iter()
            .filter(|c| c.as_str() != id_column)
            .cloned()
            .collect();
        create_sheet(
            &responses,
            std::iter::once(id_column).chain(columns.iter().map(String::as_str)),
        )?;

        info!(sheet = %responses.display(), columns = columns.len(), "Created responses sheet");
        Ok(DestinationSchema {
            columns,
            created: true,
        })
    }

    async fn append_rows(&self, source_id: &str, batch: &ResponseBatch) -> Result<u64> {
        let (responses, _) = self.sheets(source_id);
        let header = read_header(&responses)?.ok_or_else(|| {
            AppError::NotFound(format!("Sheet {} does not exist", responses.display()))
        })?;

        // Records follow the sheet's header order; missing columns stay blank.
        let positions: Vec<Option<usize>> = header
            .iter()
            .map(|column| batch.column_index(column))
            .collect();

        let mut writer = append_writer(&responses)?;
        for row in batch.rows() {
            let record: Vec<String> = header
                .iter()
                .zip(&positions)
                .map(|(column, position)| match position {
                    _ if column == batch.id_column() => row.response_id.clone(),
                    Some(index) => row.cells[*index].to_string(),
                    None => String::new(),
                })
                .collect();
            writer
                .write_record(&record)
                .map_err(|e| csv_error(&responses, e))?;
        }
        writer.flush()?;

        debug!(sheet = %responses.display(), written = batch.len(), "Appended responses");
        Ok(batch.len() as u64)
    }

    async fn reset(&self, source_id: &str) -> Result<()> {
        let (responses, status) = self.sheets(source_id);
        remove_if_exists(&responses)?;
        remove_if_exists(&status)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::response_batch::CellValue;
    use chrono::Utc;
    use std::fs;

    fn batch(columns: &[&str], rows: &[(&str, Vec<CellValue>)]) -> ResponseBatch {
        let mut batch =
            ResponseBatch::new("ResponseId", columns.iter().map(|c| c.to_string()).collect());
        for (id, cells) in rows {
            batch.push_row(*id, cells.clone()).unwrap();
        }
        batch
    }

    #[tokio::test]
    async fn test_sheet_created_and_appended_in_header_order() {
        let dir = tempfile::tempdir().unwrap();
        let dest = WorkbookDestination::open(dir.path()).unwrap();

        let first = batch(
            &["Q1", "Q2"],
            &[("R_1", vec![CellValue::Int(1), CellValue::Text("a, b".into())])],
        );
        let schema = dest.ensure_schema("SV_1", &first).await.unwrap();
        assert!(schema.created);
        dest.append_rows("SV_1", &first).await.unwrap();

        let reordered = batch(
            &["Q2", "Q1"],
            &[("R_2", vec![CellValue::Null, CellValue::Float(2.5)])],
        );
        let schema = dest.ensure_schema("SV_1", &reordered).await.unwrap();
        assert!(!schema.created);
        assert_eq!(schema.columns, vec!["Q1", "Q2"]);
        dest.append_rows("SV_1", &reordered).await.unwrap();

        let content = fs::read_to_string(dir.path().join("SV_1_responses.csv")).unwrap();
        assert_eq!(content, "ResponseId,Q1,Q2\nR_1,1,\"a, b\"\nR_2,2.5,\n");
    }

    #[tokio::test]
    async fn test_cursor_round_trip_through_status_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let dest = WorkbookDestination::open(dir.path())
            .unwrap()
            .with_table_name(Some("wellbeing".to_string()));
        assert_eq!(dest.read_cursor("SV_1").await.unwrap(), None);

        for last in ["R_1", "R_2"] {
            let cursor = SyncCursor {
                source_id: "SV_1".to_string(),
                timestamp: Utc::now(),
                last_response_id: Some(last.to_string()),
                continuation_token: None,
                file_id: Some("F_1".to_string()),
            };
            dest.append_cursor(&cursor).await.unwrap();
        }

        let latest = dest.read_cursor("SV_1").await.unwrap().unwrap();
        assert_eq!(latest.last_response_id.as_deref(), Some("R_2"));
        assert_eq!(latest.continuation_token, None);
        assert!(dir.path().join("wellbeing_status.csv").exists());
    }

    #[tokio::test]
    async fn test_reset_removes_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let dest = WorkbookDestination::open(dir.path()).unwrap();
        let sample = batch(&["Q1"], &[("R_1", vec![CellValue::Int(1)])]);
        dest.ensure_schema("SV_1", &sample).await.unwrap();

        dest.reset("SV_1").await.unwrap();
        assert!(!dir.path().join("SV_1_responses.csv").exists());
        assert!(!dir.path().join("SV_1_status.csv").exists());
        dest.reset("SV_1").await.unwrap();
    }

    #[tokio::test]
    async fn test_append_without_sheet_fails() {
        let dir = tempfile::tempdir().unwrap();
        let dest = WorkbookDestination::open(dir.path()).unwrap();
        let sample = batch(&["Q1"], &[("R_1", vec![CellValue::Int(1)])]);
        assert!(dest.append_rows("SV_1", &sample).await.is_err());
    }
}
