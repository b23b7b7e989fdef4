use crate::application::use_cases::sync_orchestrator::ResponsePostProcessor;
use crate::domain::codebook::{Codebook, QuestionType, SubQuestion, TEXT_ENTRY_SUFFIX};
use crate::domain::error::Result;
use crate::domain::response_batch::{CellValue, ResponseBatch};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Value written when a respondent picked more than one option.
pub const MULTIPLE_MARKER: &str = "Multiple";

pub const DEFAULT_DELIMITER: &str = ", ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoalesceOptions {
    pub delimiter: String,
    /// Collapse multi-option answers to [`MULTIPLE_MARKER`] instead of
    /// joining them.
    pub use_multiple_marker: bool,
}

impl Default for CoalesceOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            use_multiple_marker: true,
        }
    }
}

/// Folds each multi-select question's option columns into one column named
/// after the question.
///
/// Free-text `_TEXT` columns are not options: they are neither counted as
/// selections nor dropped. Questions with none of their option columns in
/// the batch are left alone, so applying this twice, or to a partial export,
/// changes nothing further.
pub fn coalesce_multiselect(
    mut batch: ResponseBatch,
    codebook: &Codebook,
    options: &CoalesceOptions,
) -> Result<ResponseBatch> {
    for question in codebook.questions() {
        if question.question_type() != QuestionType::MultiChoice {
            continue;
        }
        let option_columns: Vec<&SubQuestion> = question
            .sub_questions()
            .iter()
            .filter(|sub| !sub.question_number.ends_with(TEXT_ENTRY_SUFFIX))
            .collect();
        if option_columns.len() <= 1 {
            continue;
        }

        let present: Vec<usize> = option_columns
            .iter()
            .filter_map(|sub| batch.column_index(&sub.question_number))
            .collect();
        if present.is_empty() {
            continue;
        }

        let values: Vec<CellValue> = batch
            .rows()
            .iter()
            .map(|row| {
                let selected: Vec<String> = present
                    .iter()
                    .map(|index| &row.cells[*index])
                    .filter(|cell| !cell.is_null())
                    .map(ToString::to_string)
                    .collect();
                match selected.len() {
                    0 => CellValue::Null,
                    n if n > 1 && options.use_multiple_marker => {
                        CellValue::Text(MULTIPLE_MARKER.to_string())
                    }
                    _ => CellValue::Text(selected.join(options.delimiter.as_str())),
                }
            })
            .collect();

        let sub_columns: Vec<String> = present
            .iter()
            .map(|index| batch.columns()[*index].clone())
            .collect();
        let mut dropped: Vec<&str> = sub_columns.iter().map(String::as_str).collect();
        dropped.push(&question.question_number);

        let first = present.iter().copied().min().unwrap_or(0);
        let position = batch.columns()[..first]
            .iter()
            .filter(|column| !dropped.contains(&column.as_str()))
            .count();
        batch.drop_columns(&dropped);
        batch.insert_column(position, question.question_number.clone(), values)?;

        debug!(
            question = %question.question_number,
            columns = sub_columns.len(),
            "Coalesced multi-select columns"
        );
    }

    Ok(batch)
}

/// Renames codebook columns to `"{number} - {question text}"` when `verbose`.
///
/// With `verbose` off names are kept; the pass only reports how many columns
/// the codebook recognizes. Columns the codebook does not know pass through.
pub fn rename_columns(mut batch: ResponseBatch, codebook: &Codebook, verbose: bool) -> ResponseBatch {
    let renames: HashMap<String, String> = batch
        .columns()
        .iter()
        .filter_map(|column| {
            codebook.lookup_column(column).map(|entry| {
                let target = if verbose {
                    format!("{} - {}", entry.question_number, entry.question_string)
                } else {
                    column.clone()
                };
                (column.clone(), target)
            })
        })
        .collect();

    let renamed = batch.rename_columns(&renames);
    debug!(
        recognized = renames.len(),
        renamed,
        verbose,
        "Renamed codebook columns"
    );
    batch
}

/// Coalesce-then-rename pipeline bound to one codebook.
#[derive(Debug, Clone)]
pub struct CodebookTransform {
    codebook: Arc<Codebook>,
    coalesce: CoalesceOptions,
    verbose: bool,
}

impl CodebookTransform {
    pub fn new(codebook: Arc<Codebook>) -> Self {
        Self {
            codebook,
            coalesce: CoalesceOptions::default(),
            verbose: true,
        }
    }

    pub fn with_coalesce_options(mut self, options: CoalesceOptions) -> Self {
        self.coalesce = options;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn apply(&self, batch: ResponseBatch) -> Result<ResponseBatch> {
        let batch = coalesce_multiselect(batch, &self.codebook, &self.coalesce)?;
        Ok(rename_columns(batch, &self.codebook, self.verbose))
    }

    pub fn into_post_processor(self) -> ResponsePostProcessor {
        Arc::new(move |batch: ResponseBatch| self.apply(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::codebook::{QuestionDescriptor, QuestionKind, SubQuestion};

    fn sub(number: &str, text: &str) -> SubQuestion {
        SubQuestion {
            question_number: number.to_string(),
            question_string: text.to_string(),
            answer_choices: None,
        }
    }

    fn codebook() -> Codebook {
        Codebook::new(vec![
            QuestionDescriptor {
                question_number: "Q1".to_string(),
                question_string: "Age".to_string(),
                kind: QuestionKind::SingleChoice {
                    answer_choices: Default::default(),
                },
            },
            QuestionDescriptor {
                question_number: "Q2".to_string(),
                question_string: "Contact".to_string(),
                kind: QuestionKind::MultiChoice {
                    options: vec![
                        sub("Q2_1", "Contact - Email"),
                        sub("Q2_2", "Contact - Phone"),
                        sub("Q2_3", "Contact - Mail"),
                    ],
                },
            },
            QuestionDescriptor {
                question_number: "Q3".to_string(),
                question_string: "Comments".to_string(),
                kind: QuestionKind::TextEntry {
                    fields: vec![sub("Q3", "Comments")],
                },
            },
        ])
    }

    fn text(value: &str) -> CellValue {
        CellValue::Text(value.to_string())
    }

    fn raw_batch() -> ResponseBatch {
        let columns = ["StartDate", "Q1", "Q2_1", "Q2_2", "Q2_3", "Q3"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let mut batch = ResponseBatch::new("ResponseId", columns);
        batch
            .push_row(
                "R_1",
                vec![
                    text("2024-01-01"),
                    CellValue::Int(30),
                    text("Email"),
                    CellValue::Null,
                    CellValue::Null,
                    text("fine"),
                ],
            )
            .unwrap();
        batch
            .push_row(
                "R_2",
                vec![
                    text("2024-01-02"),
                    CellValue::Int(41),
                    text("Email"),
                    text("Phone"),
                    CellValue::Null,
                    CellValue::Null,
                ],
            )
            .unwrap();
        batch
            .push_row(
                "R_3",
                vec![
                    text("2024-01-03"),
                    CellValue::Null,
                    CellValue::Null,
                    CellValue::Null,
                    CellValue::Null,
                    CellValue::Null,
                ],
            )
            .unwrap();
        batch
    }

    #[test]
    fn test_coalesce_with_marker() {
        let batch =
            coalesce_multiselect(raw_batch(), &codebook(), &CoalesceOptions::default()).unwrap();

        assert_eq!(
            batch.columns(),
            &["StartDate", "Q1", "Q2", "Q3"].map(String::from)
        );
        assert_eq!(batch.cell(0, "Q2"), Some(&text("Email")));
        assert_eq!(batch.cell(1, "Q2"), Some(&text(MULTIPLE_MARKER)));
        assert_eq!(batch.cell(2, "Q2"), Some(&CellValue::Null));
    }

    #[test]
    fn test_coalesce_joins_without_marker() {
        let options = CoalesceOptions {
            delimiter: "; ".to_string(),
            use_multiple_marker: false,
        };
        let batch = coalesce_multiselect(raw_batch(), &codebook(), &options).unwrap();
        assert_eq!(batch.cell(1, "Q2"), Some(&text("Email; Phone")));
    }

    #[test]
    fn test_coalesce_partial_and_repeated() {
        let mut partial = raw_batch();
        partial.drop_columns(&["Q2_3"]);
        let once = coalesce_multiselect(partial, &codebook(), &CoalesceOptions::default()).unwrap();
        assert!(once.has_column("Q2"));
        assert!(!once.has_column("Q2_1"));

        let twice =
            coalesce_multiselect(once.clone(), &codebook(), &CoalesceOptions::default()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_coalesce_zero_rows_keeps_column() {
        let columns = vec!["Q2_1".to_string(), "Q2_2".to_string()];
        let empty = ResponseBatch::new("ResponseId", columns);
        let batch = coalesce_multiselect(empty, &codebook(), &CoalesceOptions::default()).unwrap();
        assert_eq!(batch.columns(), &["Q2".to_string()]);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_text_entry_column_survives_coalesce() {
        let codebook = Codebook::new(vec![QuestionDescriptor {
            question_number: "Q4".to_string(),
            question_string: "Source".to_string(),
            kind: QuestionKind::MultiChoice {
                options: vec![
                    sub("Q4_1", "Source - Friend"),
                    sub("Q4_2", "Source - Other"),
                    sub("Q4_2_TEXT", "Source - Other"),
                ],
            },
        }]);
        let columns = ["Q4_1", "Q4_2", "Q4_2_TEXT"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let mut raw = ResponseBatch::new("ResponseId", columns);
        raw.push_row("R_1", vec![CellValue::Null, text("Other"), text("my text")])
            .unwrap();
        raw.push_row("R_2", vec![text("Friend"), CellValue::Null, CellValue::Null])
            .unwrap();

        let batch = coalesce_multiselect(raw, &codebook, &CoalesceOptions::default()).unwrap();
        assert_eq!(batch.columns(), &["Q4", "Q4_2_TEXT"].map(String::from));
        assert_eq!(batch.cell(0, "Q4"), Some(&text("Other")));
        assert_eq!(batch.cell(0, "Q4_2_TEXT"), Some(&text("my text")));
        assert_eq!(batch.cell(1, "Q4"), Some(&text("Friend")));
        assert_eq!(batch.cell(1, "Q4_2_TEXT"), Some(&CellValue::Null));
    }

    #[test]
    fn test_rename_verbose() {
        let batch = rename_columns(raw_batch(), &codebook(), true);
        assert_eq!(
            batch.columns(),
            &[
                "StartDate",
                "Q1 - Age",
                "Q2_1 - Contact - Email",
                "Q2_2 - Contact - Phone",
                "Q2_3 - Contact - Mail",
                "Q3 - Comments",
            ]
            .map(String::from)
        );
    }

    #[test]
    fn test_rename_non_verbose_is_idempotent() {
        let once = rename_columns(raw_batch(), &codebook(), false);
        assert_eq!(once.columns(), raw_batch().columns());
        let twice = rename_columns(once.clone(), &codebook(), false);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_pipeline_order_independent() {
        let transform = CodebookTransform::new(Arc::new(codebook()));
        let batch = transform.apply(raw_batch()).unwrap();
        assert_eq!(
            batch.columns(),
            &["StartDate", "Q1 - Age", "Q2 - Contact", "Q3 - Comments"].map(String::from)
        );

        let renamed_first = rename_columns(raw_batch(), &codebook(), true);
        let then_coalesced =
            coalesce_multiselect(renamed_first.clone(), &codebook(), &CoalesceOptions::default())
                .unwrap();
        assert_eq!(renamed_first, then_coalesced);
    }

    #[test]
    fn test_transform_with_join_options() {
        let batch = CodebookTransform::new(Arc::new(codebook()))
            .with_verbose(false)
            .with_coalesce_options(CoalesceOptions {
                use_multiple_marker: false,
                ..Default::default()
            })
            .apply(raw_batch())
            .unwrap();
        assert_eq!(batch.cell(1, "Q2"), Some(&text("Email, Phone")));
    }

    #[test]
    fn test_post_processor_wraps_transform() {
        let processor = CodebookTransform::new(Arc::new(codebook()))
            .with_verbose(false)
            .into_post_processor();
        let batch = processor(raw_batch()).unwrap();
        assert_eq!(
            batch.columns(),
            &["StartDate", "Q1", "Q2", "Q3"].map(String::from)
        );
    }
}
