// Question editing helpers
// Fresh question construction, fill-in-the-blank synchronization and inline
// validation used by the question wizards

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::model::{
    FillInTheBlankQuestion, Id, McqQuestion, Question, ReadingQuestion, SubQuestion, Test,
    WritingQuestion, NO_ANSWER,
};
use super::rich_text::plain_text;
use crate::traits::TimeProvider;

/// Literal marker for a blank inside a fill-in-the-blank passage.
pub const BLANK_MARKER: &str = "{blank}";

const MIN_OPTIONS: usize = 2;

// ============================================================================
// Construction
// ============================================================================

/// Timestamp id, offset so ids created in the same millisecond stay distinct.
pub fn next_id(time: &dyn TimeProvider, offset: i64) -> Id {
    Id::Number(time.unix_timestamp_millis() + offset)
}

pub fn new_test(time: &dyn TimeProvider, name: &str, description: &str) -> Test {
    let mut test = Test::new(next_id(time, 0), name, description);
    test.created_date = Some(time.now_utc().to_rfc3339());
    test
}

pub fn new_mcq(time: &dyn TimeProvider) -> Question {
    Question::Mcq(McqQuestion {
        id: next_id(time, 0),
        text: String::new(),
        options: vec![String::new(), String::new()],
        correct_answer: NO_ANSWER,
    })
}

pub fn new_reading(time: &dyn TimeProvider) -> Question {
    Question::Reading(ReadingQuestion {
        id: next_id(time, 0),
        title: Some(String::new()),
        passage: String::new(),
        questions: vec![SubQuestion::empty(next_id(time, 1))],
    })
}

pub fn new_fill_in_the_blank(time: &dyn TimeProvider) -> Question {
    Question::FillInTheBlank(FillInTheBlankQuestion {
        id: next_id(time, 0),
        title: Some(String::new()),
        passage: String::new(),
        questions: vec![SubQuestion::empty(next_id(time, 1))],
    })
}

pub fn new_writing(time: &dyn TimeProvider) -> Question {
    Question::Writing(WritingQuestion {
        id: next_id(time, 0),
        text: String::new(),
        answer: String::new(),
    })
}

// ============================================================================
// Fill-in-the-blank synchronization
// ============================================================================

pub fn count_blanks(passage: &str) -> usize {
    passage.matches(BLANK_MARKER).count()
}

/// Makes the sub-question list match the passage's blank count: appends empty
/// sub-questions for new blanks, truncates from the end for removed ones.
/// Returns true when the list changed.
pub fn sync_blanks(question: &mut FillInTheBlankQuestion, time: &dyn TimeProvider) -> bool {
    let blanks = count_blanks(&question.passage);
    let current = question.questions.len();

    if blanks > current {
        for i in 0..(blanks - current) {
            let offset = (current + i + 1) as i64;
            question
                .questions
                .push(SubQuestion::empty(next_id(time, offset)));
        }
        true
    } else if blanks < current {
        question.questions.truncate(blanks);
        true
    } else {
        false
    }
}

/// Replaces the passage and resynchronizes the sub-questions.
pub fn set_passage(
    question: &mut FillInTheBlankQuestion,
    passage: impl Into<String>,
    time: &dyn TimeProvider,
) {
    question.passage = passage.into();
    sync_blanks(question, time);
}

// ============================================================================
// Validation
// ============================================================================

/// Field path to message, e.g. `"subQuestions.1.correctAnswer"`. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    fn add(&mut self, field: impl Into<String>, message: &str) {
        self.0.entry(field.into()).or_insert_with(|| message.to_string());
    }
}

pub fn is_non_empty(html: &str) -> bool {
    !plain_text(html).trim().is_empty()
}

fn check_options(
    errors: &mut ValidationErrors,
    prefix: &str,
    options: &[String],
    correct_answer: i32,
) {
    if options.len() < MIN_OPTIONS {
        errors.add(
            format!("{}options", prefix),
            "At least two options are required.",
        );
    } else if options.iter().any(|o| o.trim().is_empty()) {
        errors.add(format!("{}options", prefix), "All options must be filled in.");
    }

    let marked = usize::try_from(correct_answer)
        .map(|i| i < options.len())
        .unwrap_or(false);
    if !marked {
        errors.add(
            format!("{}correctAnswer", prefix),
            "Please select the correct answer.",
        );
    }
}

fn check_sub_questions(errors: &mut ValidationErrors, subs: &[SubQuestion], require_text: bool) {
    for (i, sub) in subs.iter().enumerate() {
        let prefix = format!("subQuestions.{}.", i);
        if require_text && !is_non_empty(&sub.text) {
            errors.add(format!("{}text", prefix), "Question text is required.");
        }
        check_options(errors, &prefix, &sub.options, sub.correct_answer);
    }
}

/// User-correctable problems with a question, keyed by field.
pub fn validate_question(question: &Question) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    match question {
        Question::Mcq(q) => {
            if !is_non_empty(&q.text) {
                errors.add("text", "Question text is required.");
            }
            check_options(&mut errors, "", &q.options, q.correct_answer);
        }
        Question::Reading(q) => {
            if !is_non_empty(&q.passage) {
                errors.add("passage", "Passage is required.");
            }
            if q.questions.is_empty() {
                errors.add("questions", "Add at least one question.");
            }
            check_sub_questions(&mut errors, &q.questions, true);
        }
        Question::FillInTheBlank(q) => {
            let blanks = count_blanks(&q.passage);
            if !is_non_empty(&q.passage) {
                errors.add("passage", "Passage is required.");
            } else if blanks == 0 {
                errors.add("passage", "The passage must contain at least one {blank}.");
            }
            if blanks != q.questions.len() {
                errors.add(
                    "questions",
                    "The number of questions must match the number of blanks.",
                );
            }
            check_sub_questions(&mut errors, &q.questions, false);
        }
        Question::Writing(q) => {
            if !is_non_empty(&q.text) {
                errors.add("text", "Question text is required.");
            }
            if q.answer.trim().is_empty() {
                errors.add("answer", "A reference answer is required.");
            }
        }
        Question::Unsupported(_) => {
            errors.add("type", "Unsupported question type.");
        }
    }

    errors
}

pub fn validate_test_name(name: &str) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    if name.trim().is_empty() {
        errors.add("name", "Test name is required.");
    }
    errors
}
