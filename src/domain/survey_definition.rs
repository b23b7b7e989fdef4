// ============================================================
// SURVEY DEFINITION DOCUMENT
// ============================================================
// Typed access to the exported survey definition (.qsf). The export is
// loose about shapes (`RecodeValues` may be `[]`, `ChoiceDataExportTags`
// may be `false`, choice keys may be numbers), so fields are read from
// `serde_json::Value` rather than derived.

use crate::domain::error::{AppError, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Element discriminator for survey questions.
pub const SURVEY_QUESTION_ELEMENT: &str = "SQ";

#[derive(Debug, Clone)]
pub struct SurveyDefinition {
    elements: Vec<Value>,
}

impl SurveyDefinition {
    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content).map_err(|e| {
            AppError::MalformedDefinition(format!("Document is not valid JSON: {}", e))
        })?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let mut root = match value {
            Value::Object(map) => map,
            other => {
                return Err(AppError::MalformedDefinition(format!(
                    "Expected a JSON object at the top level, found {}",
                    json_kind(&other)
                )))
            }
        };

        match root.remove("SurveyElements") {
            Some(Value::Array(elements)) => Ok(Self { elements }),
            Some(other) => Err(AppError::MalformedDefinition(format!(
                "SurveyElements must be an array, found {}",
                json_kind(&other)
            ))),
            None => Err(AppError::MalformedDefinition(
                "Missing SurveyElements array".to_string(),
            )),
        }
    }

    /// Payloads of the survey-question elements, in document order. Elements
    /// of other kinds are skipped; a question element without an object
    /// payload is yielded as `None` so the caller can report it.
    pub fn question_payloads(&self) -> impl Iterator<Item = (usize, Option<&Map<String, Value>>)> {
        self.elements
            .iter()
            .enumerate()
            .filter(|(_, element)| {
                element.get("Element").and_then(Value::as_str) == Some(SURVEY_QUESTION_ELEMENT)
            })
            .map(|(index, element)| (index, element.get("Payload").and_then(Value::as_object)))
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceEntry {
    pub display: String,
    /// The choice carries a free-text box stored as its own `_TEXT` column.
    pub text_entry: bool,
}

/// Fields of one survey-question payload that drive codebook generation.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionPayload {
    pub question_text: String,
    pub data_export_tag: String,
    pub question_type: String,
    pub selector: Option<String>,
    pub choices: Option<BTreeMap<String, ChoiceEntry>>,
    pub choice_order: Option<Vec<String>>,
    pub recode_values: BTreeMap<String, String>,
    pub answers: Option<BTreeMap<String, ChoiceEntry>>,
    pub choice_data_export_tags: BTreeMap<String, String>,
}

impl QuestionPayload {
    pub fn from_map(payload: &Map<String, Value>) -> Result<Self> {
        let question_text = required_string(payload, "QuestionText")?;
        let data_export_tag = required_string(payload, "DataExportTag")?;
        let question_type = required_string(payload, "QuestionType")?;

        Ok(Self {
            question_text,
            data_export_tag,
            question_type,
            selector: payload.get("Selector").and_then(scalar_string),
            choices: payload.get("Choices").and_then(choice_map),
            choice_order: payload.get("ChoiceOrder").and_then(string_list),
            recode_values: payload
                .get("RecodeValues")
                .and_then(string_map)
                .unwrap_or_default(),
            answers: payload.get("Answers").and_then(choice_map),
            choice_data_export_tags: payload
                .get("ChoiceDataExportTags")
                .and_then(string_map)
                .unwrap_or_default(),
        })
    }
}

fn required_string(payload: &Map<String, Value>, field: &str) -> Result<String> {
    payload
        .get(field)
        .and_then(scalar_string)
        .ok_or_else(|| AppError::MalformedDefinition(format!("Question payload missing {}", field)))
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(scalar_string).collect())
}

fn string_map(value: &Value) -> Option<BTreeMap<String, String>> {
    value.as_object().map(|map| {
        map.iter()
            .filter_map(|(key, v)| scalar_string(v).map(|s| (key.clone(), s)))
            .collect()
    })
}

fn choice_map(value: &Value) -> Option<BTreeMap<String, ChoiceEntry>> {
    value.as_object().map(|map| {
        map.iter()
            .filter_map(|(key, entry)| {
                let display = entry.get("Display").and_then(scalar_string)?;
                let text_entry = match entry.get("TextEntry") {
                    None | Some(Value::Null) | Some(Value::Bool(false)) => false,
                    Some(Value::String(flag)) => !flag.eq_ignore_ascii_case("false"),
                    Some(_) => true,
                };
                Some((key.clone(), ChoiceEntry { display, text_entry }))
            })
            .collect()
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
