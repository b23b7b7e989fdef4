use crate::domain::codebook::{
    compare_question_numbers, AnswerChoices, Codebook, QuestionDescriptor, QuestionKind,
    SubQuestion, TEXT_ENTRY_SUFFIX,
};
use crate::domain::error::{AppError, Result};
use crate::domain::survey_definition::{QuestionPayload, SurveyDefinition};
use crate::shared::text_normalizer::normalize_html;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

const MATRIX_TYPE: &str = "Matrix";
const MULTIPLE_CHOICE_TYPE: &str = "MC";
const TEXT_ENTRY_TYPE: &str = "TE";

/// Dropdown list, single answer vertical/horizontal/column, select box.
const SINGLE_ANSWER_SELECTORS: &[&str] = &["DL", "SAVR", "SAHR", "SACOL", "SB"];
/// Multiple answer vertical/horizontal/column, multi select box.
const MULTI_ANSWER_SELECTORS: &[&str] = &["MAVR", "MAHR", "MACOL", "MSB"];

/// Answer axis of every multi-select option column.
pub fn multi_select_answer_choices() -> AnswerChoices {
    [("-1", "Not Selected"), ("1", "Selected"), ("Null", "Not Shown")]
        .into_iter()
        .map(|(code, label)| (code.to_string(), label.to_string()))
        .collect()
}

/// Builds a sorted, HTML-normalized codebook from a survey definition.
///
/// Only a missing or mistyped `SurveyElements` array is fatal. A question
/// element whose payload lacks a required field is logged and skipped.
pub fn generate_codebook(definition: &SurveyDefinition) -> Result<Codebook> {
    let mut questions = Vec::new();

    for (index, payload) in definition.question_payloads() {
        let Some(payload) = payload else {
            warn!(element = index, "Skipping survey question without a payload object");
            continue;
        };

        match QuestionPayload::from_map(payload) {
            Ok(payload) => questions.push(map_question(&payload)),
            Err(err) => {
                warn!(element = index, error = %err, "Skipping malformed survey question");
            }
        }
    }

    let codebook = format_codebook(questions);
    info!(
        elements = definition.element_count(),
        questions = codebook.len(),
        "Generated codebook"
    );
    Ok(codebook)
}

/// Reads either a survey definition (`.qsf` or any non-codebook JSON) or a
/// codebook previously written as JSON.
pub fn load_codebook(path: &Path) -> Result<Codebook> {
    let content = fs::read_to_string(path).map_err(|e| {
        AppError::IoError(format!("Failed to read {}: {}", path.display(), e))
    })?;

    let value: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
        AppError::MalformedDefinition(format!("{} is not valid JSON: {}", path.display(), e))
    })?;

    if value.is_array() {
        return serde_json::from_value(value).map_err(|e| {
            AppError::ParseError(format!("Invalid codebook {}: {}", path.display(), e))
        });
    }

    generate_codebook(&SurveyDefinition::from_value(value)?)
}

fn map_question(payload: &QuestionPayload) -> QuestionDescriptor {
    let kind = match payload.question_type.as_str() {
        MATRIX_TYPE => {
            let answer_choices: AnswerChoices = payload
                .answers
                .iter()
                .flatten()
                .map(|(key, answer)| (recode(payload, key), answer.display.clone()))
                .collect();
            let rows = explode_question_number(payload)
                .into_iter()
                .map(|row| SubQuestion {
                    answer_choices: Some(answer_choices.clone()),
                    ..row
                })
                .collect();
            QuestionKind::Matrix { rows }
        }
        MULTIPLE_CHOICE_TYPE => match payload.selector.as_deref() {
            Some(selector) if SINGLE_ANSWER_SELECTORS.contains(&selector) => {
                let answer_choices = payload
                    .choices
                    .iter()
                    .flatten()
                    .map(|(key, choice)| (recode(payload, key), choice.display.clone()))
                    .collect();
                QuestionKind::SingleChoice { answer_choices }
            }
            Some(selector) if MULTI_ANSWER_SELECTORS.contains(&selector) => {
                let options = explode_question_number(payload)
                    .into_iter()
                    .map(|option| SubQuestion {
                        answer_choices: Some(multi_select_answer_choices()),
                        ..option
                    })
                    .collect();
                QuestionKind::MultiChoice { options }
            }
            other => QuestionKind::Unsupported {
                raw_type: format!(
                    "{}/{}",
                    MULTIPLE_CHOICE_TYPE,
                    other.unwrap_or("no selector")
                ),
            },
        },
        TEXT_ENTRY_TYPE => QuestionKind::TextEntry {
            fields: explode_question_number(payload),
        },
        other => QuestionKind::Unsupported {
            raw_type: other.to_string(),
        },
    };

    QuestionDescriptor {
        question_number: payload.data_export_tag.clone(),
        question_string: payload.question_text.clone(),
        kind,
    }
}

fn recode(payload: &QuestionPayload, key: &str) -> String {
    payload
        .recode_values
        .get(key)
        .cloned()
        .unwrap_or_else(|| key.to_string())
}

/// Expands a question into one sub-question per ordered choice.
///
/// Sub-question numbers are `{root}_{recode}` unless `ChoiceDataExportTags`
/// names the column outright. Choices with a free-text box also produce a
/// `_TEXT` column, except on text-entry questions where the choice already
/// is the text column. Without choices the question is its own single
/// sub-question.
pub fn explode_question_number(payload: &QuestionPayload) -> Vec<SubQuestion> {
    let root_number = &payload.data_export_tag;
    let root_string = &payload.question_text;

    let (Some(choices), Some(order)) = (&payload.choices, &payload.choice_order) else {
        return vec![SubQuestion {
            question_number: root_number.clone(),
            question_string: root_string.clone(),
            answer_choices: None,
        }];
    };

    let mut sub_questions = Vec::with_capacity(order.len());
    for key in order {
        let Some(choice) = choices.get(key) else {
            debug!(question = %root_number, choice = %key, "ChoiceOrder references unknown choice");
            continue;
        };

        let question_string = format!("{} - {}", root_string, choice.display);
        let question_number = payload
            .choice_data_export_tags
            .get(key)
            .cloned()
            .unwrap_or_else(|| format!("{}_{}", root_number, recode(payload, key)));

        let text_column = (payload.question_type != TEXT_ENTRY_TYPE && choice.text_entry)
            .then(|| format!("{}{}", question_number, TEXT_ENTRY_SUFFIX));

        sub_questions.push(SubQuestion {
            question_number,
            question_string: question_string.clone(),
            answer_choices: None,
        });

        if let Some(question_number) = text_column {
            sub_questions.push(SubQuestion {
                question_number,
                question_string,
                answer_choices: None,
            });
        }
    }

    sub_questions
}

/// Sorts by numeric question number, drops repeated numbers, and strips HTML
/// from every display string.
fn format_codebook(mut questions: Vec<QuestionDescriptor>) -> Codebook {
    questions.sort_by(|a, b| compare_question_numbers(&a.question_number, &b.question_number));

    let mut seen = HashSet::new();
    questions.retain(|question| {
        let first = seen.insert(question.question_number.clone());
        if !first {
            warn!(
                question = %question.question_number,
                "Dropping question with duplicate export tag"
            );
        }
        first
    });

    for question in questions.iter_mut() {
        question.map_text(normalize_html);
    }

    Codebook::new(questions)
}
