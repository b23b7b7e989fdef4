use crate::application::use_cases::sync_orchestrator::{
    CursorStore, DestinationSchema, DestinationStore,
};
use crate::domain::error::{AppError, Result};
use crate::domain::response_batch::{CellValue, ColumnKind, ResponseBatch};
use crate::domain::store_names::StoreNames;
use crate::domain::sync_cursor::SyncCursor;
use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqlitePool};
use sqlx::{Row, Sqlite};
use tracing::{debug, info};

const SURROGATE_KEY: &str = "id";

/// Responses and sync status kept as two tables of one SQLite database.
pub struct SqliteDestination {
    pool: SqlitePool,
    table_name: Option<String>,
}

impl SqliteDestination {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            table_name: None,
        }
    }

    pub fn with_table_name(mut self, table_name: Option<String>) -> Self {
        self.table_name = table_name;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn names(&self, source_id: &str) -> StoreNames {
        StoreNames::new(source_id, self.table_name.as_deref())
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let found: Option<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to inspect tables: {}", e)))?;
        Ok(found.is_some())
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(&format!("PRAGMA table_info({})", quote_ident(table)))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to read table info: {}", e)))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("name")
                    .map_err(|e| AppError::DatabaseError(format!("Invalid table info: {}", e)))
            })
            .collect()
    }

    async fn ensure_status_table(&self, table: &str) -> Result<()> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                last_response_id TEXT,
                continuation_token TEXT,
                file_id TEXT
            )",
            quote_ident(table)
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create status table: {}", e)))?;
        Ok(())
    }
}

/// Double-quoted SQLite identifier.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_type(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Boolean | ColumnKind::Integer => "INTEGER",
        ColumnKind::Float => "REAL",
        ColumnKind::Text => "TEXT",
    }
}

/// Batch columns that would collide with the key columns of the table.
fn is_reserved(column: &str, id_column: &str) -> bool {
    column.eq_ignore_ascii_case(SURROGATE_KEY) || column.eq_ignore_ascii_case(id_column)
}

fn bind_cell<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    cell: &'q CellValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match cell {
        CellValue::Null => query.bind(None::<String>),
        CellValue::Bool(value) => query.bind(*value),
        CellValue::Int(value) => query.bind(*value),
        CellValue::Float(value) => query.bind(*value),
        CellValue::Text(value) => query.bind(value.as_str()),
    }
}

#[derive(sqlx::FromRow)]
struct StatusEntity {
    source_id: String,
    timestamp: chrono::DateTime<chrono::Utc>,
    last_response_id: Option<String>,
    continuation_token: Option<String>,
    file_id: Option<String>,
}

impl From<StatusEntity> for SyncCursor {
    fn from(e: StatusEntity) -> Self {
        Self {
            source_id: e.source_id,
            timestamp: e.timestamp,
            last_response_id: e.last_response_id,
            continuation_token: e.continuation_token,
            file_id: e.file_id,
        }
    }
}

#[async_trait]
impl CursorStore for SqliteDestination {
    async fn read_cursor(&self, source_id: &str) -> Result<Option<SyncCursor>> {
        let table = self.names(source_id).status;
        sqlx::query_as::<_, StatusEntity>(&format!(
            "SELECT source_id, timestamp, last_response_id, continuation_token, file_id
             FROM {} ORDER BY id DESC LIMIT 1",
            quote_ident(&table)
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to read status table {}: {}", table, e)))
        .map(|entity| entity.map(SyncCursor::from))
    }

    async fn append_cursor(&self, cursor: &SyncCursor) -> Result<()> {
        let table = self.names(&cursor.source_id).status;
        self.ensure_status_table(&table).await?;

        sqlx::query(&format!(
            "INSERT INTO {} (source_id, timestamp, last_response_id, continuation_token, file_id)
             VALUES (?, ?, ?, ?, ?)",
            quote_ident(&table)
        ))
        .bind(&cursor.source_id)
        .bind(cursor.timestamp)
        .bind(&cursor.last_response_id)
        .bind(&cursor.continuation_token)
        .bind(&cursor.file_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to write sync status: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl DestinationStore for SqliteDestination {
    async fn ensure_schema(
        &self,
        source_id: &str,
        sample: &ResponseBatch,
    ) -> Result<DestinationSchema> {
        let names = self.names(source_id);
        self.ensure_status_table(&names.status).await?;

        let id_column = sample.id_column();
        if self.table_exists(&names.responses).await? {
            let columns = self
                .table_columns(&names.responses)
                .await?
                .into_iter()
                .filter(|column| !is_reserved(column, id_column))
                .collect();
            return Ok(DestinationSchema {
                columns,
                created: false,
            });
        }

        let mut definitions = vec![
            format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quote_ident(SURROGATE_KEY)),
            format!("{} TEXT NOT NULL", quote_ident(id_column)),
        ];
        let mut columns = Vec::new();
        for (column, kind) in sample.column_kinds() {
            if is_reserved(&column, id_column) {
                continue;
            }
            definitions.push(format!("{} {}", quote_ident(&column), sql_type(kind)));
            columns.push(column);
        }

        sqlx::query(&format!(
            "CREATE TABLE {} ({})",
            quote_ident(&names.responses),
            definitions.join(", ")
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(format!("Failed to create table {}: {}", names.responses, e))
        })?;

        info!(table = %names.responses, columns = columns.len(), "Created responses table");
        Ok(DestinationSchema {
            columns,
            created: true,
        })
    }

    async fn append_rows(&self, source_id: &str, batch: &ResponseBatch) -> Result<u64> {
        let table = self.names(source_id).responses;

        let column_list: Vec<String> = std::iter::once(batch.id_column())
            .chain(batch.columns().iter().map(String::as_str))
            .map(quote_ident)
            .collect();
        let placeholders = vec!["?"; column_list.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&table),
            column_list.join(", "),
            placeholders
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;

        let mut written = 0u64;
        for row in batch.rows() {
            let mut query = sqlx::query(&sql).bind(row.response_id.as_str());
            for cell in &row.cells {
                query = bind_cell(query, cell);
            }
            let result = query
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to insert response: {}", e)))?;
            written += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit responses: {}", e)))?;

        debug!(table = %table, written, "Appended responses");
        Ok(written)
    }

    async fn reset(&self, source_id: &str) -> Result<()> {
        let names = self.names(source_id);
        for table in [&names.responses, &names.status] {
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to drop {}: {}", table, e)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn destination() -> SqliteDestination {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteDestination::new(pool)
    }

    fn batch() -> ResponseBatch {
        let mut batch = ResponseBatch::new(
            "ResponseId",
            vec!["Q1".to_string(), "Q2".to_string(), "Q3".to_string()],
        );
        batch
            .push_row(
                "R_1",
                vec![CellValue::Int(1), CellValue::Float(2.5), CellValue::Text("hi".into())],
            )
            .unwrap();
        batch
            .push_row("R_2", vec![CellValue::Int(2), CellValue::Null, CellValue::Null])
            .unwrap();
        batch
    }

    fn cursor(last: Option<&str>) -> SyncCursor {
        SyncCursor {
            source_id: "SV_1".to_string(),
            timestamp: Utc::now(),
            last_response_id: last.map(str::to_string),
            continuation_token: Some("tok".to_string()),
            file_id: None,
        }
    }

    #[tokio::test]
    async fn test_read_cursor_without_table_fails() {
        let dest = destination().await;
        assert!(dest.read_cursor("SV_1").await.is_err());
    }

    #[tokio::test]
    async fn test_latest_cursor_wins() {
        let dest = destination().await;
        dest.append_cursor(&cursor(Some("R_1"))).await.unwrap();
        dest.append_cursor(&cursor(Some("R_2"))).await.unwrap();

        let latest = dest.read_cursor("SV_1").await.unwrap().unwrap();
        assert_eq!(latest.last_response_id.as_deref(), Some("R_2"));
        assert_eq!(latest.continuation_token.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_schema_created_then_reused() {
        let dest = destination().await;
        let created = dest.ensure_schema("SV_1", &batch()).await.unwrap();
        assert!(created.created);
        assert_eq!(created.columns, vec!["Q1", "Q2", "Q3"]);

        let mut wider = ResponseBatch::new("ResponseId", vec!["Q1".to_string(), "Q9".to_string()]);
        wider
            .push_row("R_3", vec![CellValue::Int(1), CellValue::Int(9)])
            .unwrap();
        let existing = dest.ensure_schema("SV_1", &wider).await.unwrap();
        assert!(!existing.created);
        assert_eq!(existing.columns, vec!["Q1", "Q2", "Q3"]);

        // Status table is created alongside the responses table.
        assert_eq!(dest.read_cursor("SV_1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_append_rows_keeps_types() {
        let dest = destination().await;
        let batch = batch();
        dest.ensure_schema("SV_1", &batch).await.unwrap();
        assert_eq!(dest.append_rows("SV_1", &batch).await.unwrap(), 2);

        let rows: Vec<(String, i64, Option<f64>, Option<String>)> = sqlx::query_as(
            "SELECT ResponseId, Q1, Q2, Q3 FROM SV_1_responses ORDER BY id",
        )
        .fetch_all(dest.pool())
        .await
        .unwrap();
        assert_eq!(rows[0], ("R_1".to_string(), 1, Some(2.5), Some("hi".to_string())));
        assert_eq!(rows[1], ("R_2".to_string(), 2, None, None));
    }

    #[tokio::test]
    async fn test_table_name_override_and_reset() {
        let dest = destination()
            .await
            .with_table_name(Some("wellbeing".to_string()));
        let batch = batch();
        dest.ensure_schema("SV_1", &batch).await.unwrap();
        dest.append_rows("SV_1", &batch).await.unwrap();
        dest.append_cursor(&cursor(Some("R_2"))).await.unwrap();
        assert!(dest.table_exists("wellbeing").await.unwrap());
        assert!(dest.table_exists("wellbeing_status").await.unwrap());

        dest.reset("SV_1").await.unwrap();
        assert!(!dest.table_exists("wellbeing").await.unwrap());
        assert!(!dest.table_exists("wellbeing_status").await.unwrap());
    }

    #[tokio::test]
    async fn test_reserved_columns_skipped() {
        let dest = destination().await;
        let mut batch = ResponseBatch::new("ResponseId", vec!["ID".to_string(), "Q1".to_string()]);
        batch
            .push_row("R_1", vec![CellValue::Int(7), CellValue::Int(1)])
            .unwrap();
        let schema = dest.ensure_schema("SV_1", &batch).await.unwrap();
        assert_eq!(schema.columns, vec!["Q1"]);
    }

    #[test]
    fn test_quote_ident_escapes() {
        assert_eq!(quote_ident("Q1"), "\"Q1\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
