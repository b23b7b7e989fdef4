use crate::domain::error::{AppError, Result};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// One scalar cell of an exported response.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    /// Types raw export text: blanks are null, then integer, float and
    /// boolean are tried before falling back to text.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Null;
        }
        if let Ok(value) = trimmed.parse::<i64>() {
            return CellValue::Int(value);
        }
        if let Ok(value) = trimmed.parse::<f64>() {
            if value.is_finite() {
                return CellValue::Float(value);
            }
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return CellValue::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return CellValue::Bool(false);
        }
        CellValue::Text(raw.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn kind(&self) -> Option<ColumnKind> {
        match self {
            CellValue::Null => None,
            CellValue::Bool(_) => Some(ColumnKind::Boolean),
            CellValue::Int(_) => Some(ColumnKind::Integer),
            CellValue::Float(_) => Some(ColumnKind::Float),
            CellValue::Text(_) => Some(ColumnKind::Text),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(value) => write!(f, "{}", value),
            CellValue::Int(value) => write!(f, "{}", value),
            CellValue::Float(value) => write!(f, "{}", value),
            CellValue::Text(value) => write!(f, "{}", value),
        }
    }
}

/// Storage type inferred for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Boolean,
    Integer,
    Float,
    Text,
}

impl ColumnKind {
    fn merge(self, other: ColumnKind) -> ColumnKind {
        use ColumnKind::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Integer, Float) | (Float, Integer) => Float,
            _ => Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRow {
    pub response_id: String,
    pub cells: Vec<CellValue>,
}

/// Response table keyed by response id. Column order is preserved; the id
/// column is held separately from the data columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseBatch {
    id_column: String,
    columns: Vec<String>,
    rows: Vec<ResponseRow>,
}

impl ResponseBatch {
    pub fn new(id_column: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            id_column: id_column.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[ResponseRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn push_row(&mut self, response_id: impl Into<String>, cells: Vec<CellValue>) -> Result<()> {
        let response_id = response_id.into();
        if cells.len() != self.columns.len() {
            return Err(AppError::ValidationError(format!(
                "Row {} has {} cells but the batch has {} columns",
                response_id,
                cells.len(),
                self.columns.len()
            )));
        }
        self.rows.push(ResponseRow { response_id, cells });
        Ok(())
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&CellValue> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|r| &r.cells[index])
    }

    pub fn last_response_id(&self) -> Option<&str> {
        self.rows.last().map(|row| row.response_id.as_str())
    }

    /// Inserts a column at `position` (clamped to the end).
    pub fn insert_column(
        &mut self,
        position: usize,
        name: impl Into<String>,
        values: Vec<CellValue>,
    ) -> Result<()> {
        let name = name.into();
        if self.has_column(&name) || name == self.id_column {
            return Err(AppError::ValidationError(format!(
                "Column {} already exists",
                name
            )));
        }
        if values.len() != self.rows.len() {
            return Err(AppError::ValidationError(format!(
                "Column {} has {} values but the batch has {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }

        let position = position.min(self.columns.len());
        self.columns.insert(position, name);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.cells.insert(position, value);
        }
        Ok(())
    }

    /// Removes the named columns; unknown names are ignored.
    pub fn drop_columns(&mut self, names: &[&str]) {
        let drop: HashSet<&str> = names.iter().copied().collect();
        self.retain_columns(|column| !drop.contains(column));
    }

    /// Keeps only columns for which `keep` returns true. Returns the names
    /// that were removed.
    pub fn retain_columns<F>(&mut self, mut keep: F) -> Vec<String>
    where
        F: FnMut(&str) -> bool,
    {
        let mask: Vec<bool> = self.columns.iter().map(|column| keep(column.as_str())).collect();
        if mask.iter().all(|kept| *kept) {
            return Vec::new();
        }

        let mut removed = Vec::new();
        let mut columns = Vec::with_capacity(self.columns.len());
        for (column, kept) in self.columns.drain(..).zip(&mask) {
            if *kept {
                columns.push(column);
            } else {
                removed.push(column);
            }
        }
        self.columns = columns;

        for row in self.rows.iter_mut() {
            let mut kept = mask.iter();
            row.cells.retain(|_| *kept.next().unwrap_or(&true));
        }
        removed
    }

    /// Renames columns present in `renames`. A rename that would collide with
    /// an existing column is skipped.
    pub fn rename_columns(&mut self, renames: &HashMap<String, String>) -> usize {
        let mut taken: HashSet<String> = self.columns.iter().cloned().collect();
        let mut renamed = 0;
        for column in self.columns.iter_mut() {
            let Some(target) = renames.get(column.as_str()) else {
                continue;
            };
            if target == column || taken.contains(target) {
                continue;
            }
            taken.remove(column.as_str());
            taken.insert(target.clone());
            *column = target.clone();
            renamed += 1;
        }
        renamed
    }

    /// Drops rows for which `keep` returns false.
    pub fn retain_rows<F>(&mut self, keep: F)
    where
        F: FnMut(&ResponseRow) -> bool,
    {
        self.rows.retain(keep);
    }

    /// Storage kind per column, merged across all rows. Columns with no
    /// non-null value are text.
    pub fn column_kinds(&self) -> Vec<(String, ColumnKind)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(index, column)| {
                let kind = self
                    .rows
                    .iter()
                    .filter_map(|row| row.cells[index].kind())
                    .reduce(ColumnKind::merge)
                    .unwrap_or(ColumnKind::Text);
                (column.clone(), kind)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> ResponseBatch {
        let mut batch = ResponseBatch::new(
            "ResponseId",
            vec!["Q1".to_string(), "Q2".to_string(), "Q3".to_string()],
        );
        batch
            .push_row(
                "R_1",
                vec![CellValue::Int(1), CellValue::Null, CellValue::Text("a".into())],
            )
            .unwrap();
        batch
            .push_row(
                "R_2",
                vec![CellValue::Float(2.5), CellValue::Null, CellValue::Int(3)],
            )
            .unwrap();
        batch
    }

    #[test]
    fn test_parse_cells() {
        assert_eq!(CellValue::parse(""), CellValue::Null);
        assert_eq!(CellValue::parse("   "), CellValue::Null);
        assert_eq!(CellValue::parse("42"), CellValue::Int(42));
        assert_eq!(CellValue::parse("-1.5"), CellValue::Float(-1.5));
        assert_eq!(CellValue::parse("TRUE"), CellValue::Bool(true));
        assert_eq!(CellValue::parse("NaN"), CellValue::Text("NaN".into()));
        assert_eq!(CellValue::parse("Red"), CellValue::Text("Red".into()));
    }

    #[test]
    fn test_push_row_checks_width() {
        let mut batch = batch();
        let err = batch.push_row("R_3", vec![CellValue::Null]).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.last_response_id(), Some("R_2"));
    }

    #[test]
    fn test_column_kinds() {
        let kinds = batch().column_kinds();
        assert_eq!(kinds[0], ("Q1".to_string(), ColumnKind::Float));
        assert_eq!(kinds[1], ("Q2".to_string(), ColumnKind::Text));
        assert_eq!(kinds[2], ("Q3".to_string(), ColumnKind::Text));
    }

    #[test]
    fn test_drop_and_insert_columns() {
        let mut batch = batch();
        batch.drop_columns(&["Q2", "missing"]);
        assert_eq!(batch.columns(), &["Q1".to_string(), "Q3".to_string()]);
        assert_eq!(batch.cell(1, "Q3"), Some(&CellValue::Int(3)));

        batch
            .insert_column(1, "Q2", vec![CellValue::Bool(true), CellValue::Null])
            .unwrap();
        assert_eq!(batch.column_index("Q2"), Some(1));
        assert_eq!(batch.cell(0, "Q2"), Some(&CellValue::Bool(true)));
        assert!(batch.insert_column(0, "Q1", vec![CellValue::Null; 2]).is_err());
    }

    #[test]
    fn test_retain_columns_reports_removed() {
        let mut batch = batch();
        let removed = batch.retain_columns(|column| column != "Q1");
        assert_eq!(removed, vec!["Q1".to_string()]);
        assert_eq!(batch.rows()[0].cells.len(), 2);
    }

    #[test]
    fn test_rename_skips_collisions() {
        let mut batch = batch();
        let renames: HashMap<String, String> = [
            ("Q1".to_string(), "Q1 - Age".to_string()),
            ("Q2".to_string(), "Q3".to_string()),
        ]
        .into_iter()
        .collect();

        assert_eq!(batch.rename_columns(&renames), 1);
        assert_eq!(
            batch.columns(),
            &["Q1 - Age".to_string(), "Q2".to_string(), "Q3".to_string()]
        );
    }
}
