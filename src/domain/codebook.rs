use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Suffix of the free-text column that accompanies a choice with a text box.
pub const TEXT_ENTRY_SUFFIX: &str = "_TEXT";

/// Raw recode value -> display label.
pub type AnswerChoices = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionType {
    Matrix,
    SingleChoice,
    MultiChoice,
    TextEntry,
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubQuestion {
    pub question_number: String,
    pub question_string: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_choices: Option<AnswerChoices>,
}

/// Per-type payload of a question. Serialized with a `question_type` tag so
/// a written codebook reads back into the same variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "question_type")]
pub enum QuestionKind {
    /// One row per sub-question, all sharing the answer axis.
    Matrix { rows: Vec<SubQuestion> },
    SingleChoice { answer_choices: AnswerChoices },
    /// One selected/not-selected column per option.
    MultiChoice { options: Vec<SubQuestion> },
    TextEntry { fields: Vec<SubQuestion> },
    Unsupported { raw_type: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionDescriptor {
    pub question_number: String,
    pub question_string: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl QuestionDescriptor {
    pub fn question_type(&self) -> QuestionType {
        match self.kind {
            QuestionKind::Matrix { .. } => QuestionType::Matrix,
            QuestionKind::SingleChoice { .. } => QuestionType::SingleChoice,
            QuestionKind::MultiChoice { .. } => QuestionType::MultiChoice,
            QuestionKind::TextEntry { .. } => QuestionType::TextEntry,
            QuestionKind::Unsupported { .. } => QuestionType::Unsupported,
        }
    }

    pub fn sub_questions(&self) -> &[SubQuestion] {
        match &self.kind {
            QuestionKind::Matrix { rows } => rows,
            QuestionKind::MultiChoice { options } => options,
            QuestionKind::TextEntry { fields } => fields,
            QuestionKind::SingleChoice { .. } | QuestionKind::Unsupported { .. } => &[],
        }
    }

    /// Answer choices attached to the root question itself.
    pub fn answer_choices(&self) -> Option<&AnswerChoices> {
        match &self.kind {
            QuestionKind::SingleChoice { answer_choices } => Some(answer_choices),
            _ => None,
        }
    }

    /// Applies `f` to every display string held by this question.
    pub fn map_text<F>(&mut self, f: F)
    where
        F: Fn(&str) -> String,
    {
        self.question_string = f(&self.question_string);
        let map_choices = |choices: &mut AnswerChoices| {
            for label in choices.values_mut() {
                *label = f(label);
            }
        };
        match &mut self.kind {
            QuestionKind::SingleChoice { answer_choices } => map_choices(answer_choices),
            QuestionKind::Matrix { rows: subs }
            | QuestionKind::MultiChoice { options: subs }
            | QuestionKind::TextEntry { fields: subs } => {
                for sub in subs.iter_mut() {
                    sub.question_string = f(&sub.question_string);
                    if let Some(choices) = sub.answer_choices.as_mut() {
                        map_choices(choices);
                    }
                }
            }
            QuestionKind::Unsupported { .. } => {}
        }
    }
}

/// Flattened view of one codebook column: a root question or one of its
/// sub-questions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodebookEntry<'a> {
    pub root_number: &'a str,
    pub question_number: &'a str,
    pub question_string: &'a str,
    pub answer_choices: Option<&'a AnswerChoices>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Codebook {
    questions: Vec<QuestionDescriptor>,
}

impl Codebook {
    pub fn new(questions: Vec<QuestionDescriptor>) -> Self {
        Self { questions }
    }

    pub fn questions(&self) -> &[QuestionDescriptor] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, question_number: &str) -> Option<&QuestionDescriptor> {
        self.questions
            .iter()
            .find(|q| q.question_number == question_number)
    }

    /// Every root question followed by its sub-questions, in codebook order.
    pub fn entries(&self) -> impl Iterator<Item = CodebookEntry<'_>> {
        self.questions.iter().flat_map(|question| {
            let root = CodebookEntry {
                root_number: &question.question_number,
                question_number: &question.question_number,
                question_string: &question.question_string,
                answer_choices: question.answer_choices(),
            };
            let subs = question.sub_questions().iter().map(move |sub| CodebookEntry {
                root_number: &question.question_number,
                question_number: &sub.question_number,
                question_string: &sub.question_string,
                answer_choices: sub.answer_choices.as_ref(),
            });
            std::iter::once(root).chain(subs)
        })
    }

    /// Finds the entry whose number matches a raw export column name. Root
    /// questions win over sub-questions sharing their number.
    pub fn lookup_column(&self, column: &str) -> Option<CodebookEntry<'_>> {
        self.entries().find(|entry| entry.question_number == column)
    }
}

/// Numeric part of a question number such as `Q12` or `Q3.5`.
pub fn question_sort_key(question_number: &str) -> Option<f64> {
    let digits = question_number
        .strip_prefix('Q')
        .unwrap_or(question_number);
    digits
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Ascending by numeric suffix; unparsable numbers go last in their
/// original relative order.
pub fn compare_question_numbers(a: &str, b: &str) -> Ordering {
    match (question_sort_key(a), question_sort_key(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
