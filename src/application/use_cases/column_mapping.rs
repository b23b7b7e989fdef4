use crate::domain::codebook::{Codebook, CodebookEntry};
use crate::domain::error::{AppError, Result};
use crate::shared::text_normalizer::{normalize_html, quote_value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Target language of generated recode expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingKind {
    Sql,
    Tableau,
}

impl fmt::Display for MappingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingKind::Sql => write!(f, "sql"),
            MappingKind::Tableau => write!(f, "tableau"),
        }
    }
}

impl FromStr for MappingKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sql" => Ok(MappingKind::Sql),
            "tableau" => Ok(MappingKind::Tableau),
            other => Err(AppError::ValidationError(format!(
                "Unknown mapping kind: {}",
                other
            ))),
        }
    }
}

/// Recode expression per codebook column, keyed by question number.
///
/// Entries without answer choices have nothing to recode and are skipped.
/// When a root question and a sub-question share a number, the root wins.
pub fn generate_column_mappings(codebook: &Codebook, kind: MappingKind) -> BTreeMap<String, String> {
    let mut mappings = BTreeMap::new();
    for entry in codebook.entries() {
        let expression = match kind {
            MappingKind::Sql => sql_expression(&entry),
            MappingKind::Tableau => tableau_expression(&entry),
        };
        if let Some(expression) = expression {
            mappings
                .entry(entry.question_number.to_string())
                .or_insert(expression);
        }
    }
    mappings
}

fn sql_expression(entry: &CodebookEntry<'_>) -> Option<String> {
    let choices = entry.answer_choices.filter(|c| !c.is_empty())?;

    let mut expression = String::from("CASE\n");
    for (code, label) in choices {
        expression.push_str(&format!(
            "\tWHEN {} = {} THEN {}\n",
            entry.question_number,
            quote_value(code, '"'),
            quote_value(&normalize_html(label), '"'),
        ));
    }
    expression.push_str(&format!(
        "END AS {}",
        quote_value(entry.question_string, '`')
    ));
    Some(expression)
}

fn tableau_expression(entry: &CodebookEntry<'_>) -> Option<String> {
    let choices = entry.answer_choices.filter(|c| !c.is_empty())?;

    let branches: Vec<String> = choices
        .iter()
        .map(|(code, label)| {
            let code = if is_numeric_code(code) {
                code.clone()
            } else {
                quote_value(code, '\'')
            };
            format!(
                "IF [{}] == {} THEN {} ",
                entry.question_number,
                code,
                quote_value(&normalize_html(label), '\'')
            )
        })
        .collect();
    Some(format!("{}END", branches.join("ELSE")))
}

fn is_numeric_code(code: &str) -> bool {
    !code.is_empty() && code.chars().all(|c| c.is_numeric())
}
