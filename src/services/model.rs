// Question and test data model
// Shared nested shape consumed by the shuffle engine, the exporters and the store

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use super::rich_text::plain_text;

/// Sentinel for "no option marked correct" while a question is being edited.
pub const NO_ANSWER: i32 = -1;

fn no_answer() -> i32 {
    NO_ANSWER
}

// ============================================================================
// Identifiers
// ============================================================================

/// Client-generated identifier. Older data uses millisecond timestamps,
/// generated tests use `"<millis>-<random>"` strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Number(i64),
    Text(String),
}

impl Id {
    /// An id that was missing from the source data.
    pub fn is_unset(&self) -> bool {
        matches!(self, Id::Text(s) if s.is_empty())
    }
}

impl Default for Id {
    fn default() -> Self {
        Id::Text(String::new())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Number(n) => write!(f, "{}", n),
            Id::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Id {
    fn from(value: i64) -> Self {
        Id::Number(value)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Id::Text(value.to_string())
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Id::Text(value)
    }
}

// ============================================================================
// Questions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McqQuestion {
    #[serde(default, skip_serializing_if = "Id::is_unset")]
    pub id: Id,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default = "no_answer")]
    pub correct_answer: i32,
}

/// MCQ-shaped item nested under a reading or fill-in-the-blank question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubQuestion {
    #[serde(default, skip_serializing_if = "Id::is_unset")]
    pub id: Id,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default = "no_answer")]
    pub correct_answer: i32,
}

impl SubQuestion {
    /// A blank sub-question as the fill-in-the-blank editor creates it.
    pub fn empty(id: Id) -> Self {
        Self {
            id,
            text: String::new(),
            options: vec![String::new(), String::new()],
            correct_answer: NO_ANSWER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingQuestion {
    #[serde(default, skip_serializing_if = "Id::is_unset")]
    pub id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub passage: String,
    #[serde(default)]
    pub questions: Vec<SubQuestion>,
}

/// Passage with `{blank}` markers; `questions[i]` answers the i-th blank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillInTheBlankQuestion {
    #[serde(default, skip_serializing_if = "Id::is_unset")]
    pub id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub passage: String,
    #[serde(default)]
    pub questions: Vec<SubQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WritingQuestion {
    #[serde(default, skip_serializing_if = "Id::is_unset")]
    pub id: Id,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Question {
    Mcq(McqQuestion),
    Reading(ReadingQuestion),
    FillInTheBlank(FillInTheBlankQuestion),
    Writing(WritingQuestion),
    /// Any other `type` tag. The raw object is kept and written back as is,
    /// so foreign data survives a load and save.
    Unsupported(Value),
}

/// `type` tags of the kinds this crate understands, aliases included.
const KNOWN_TAGS: &[&str] = &["mcq", "reading", "fill-in-the-blank", "filltheblank", "writing"];

#[derive(Deserialize)]
#[serde(tag = "type")]
enum KnownQuestion {
    #[serde(rename = "mcq")]
    Mcq(McqQuestion),
    #[serde(rename = "reading")]
    Reading(ReadingQuestion),
    #[serde(rename = "fill-in-the-blank", alias = "filltheblank")]
    FillInTheBlank(FillInTheBlankQuestion),
    #[serde(rename = "writing")]
    Writing(WritingQuestion),
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum KnownQuestionRef<'a> {
    #[serde(rename = "mcq")]
    Mcq(&'a McqQuestion),
    #[serde(rename = "reading")]
    Reading(&'a ReadingQuestion),
    #[serde(rename = "fill-in-the-blank")]
    FillInTheBlank(&'a FillInTheBlankQuestion),
    #[serde(rename = "writing")]
    Writing(&'a WritingQuestion),
}

impl Serialize for Question {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Question::Mcq(q) => KnownQuestionRef::Mcq(q).serialize(serializer),
            Question::Reading(q) => KnownQuestionRef::Reading(q).serialize(serializer),
            Question::FillInTheBlank(q) => KnownQuestionRef::FillInTheBlank(q).serialize(serializer),
            Question::Writing(q) => KnownQuestionRef::Writing(q).serialize(serializer),
            Question::Unsupported(raw) => raw.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Question {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        if !value.is_object() {
            return Err(D::Error::custom("question must be an object"));
        }

        let known = value
            .get("type")
            .and_then(Value::as_str)
            .map_or(false, |tag| KNOWN_TAGS.contains(&tag));
        if !known {
            return Ok(Question::Unsupported(value));
        }

        let question = match KnownQuestion::deserialize(value).map_err(D::Error::custom)? {
            KnownQuestion::Mcq(q) => Question::Mcq(q),
            KnownQuestion::Reading(q) => Question::Reading(q),
            KnownQuestion::FillInTheBlank(q) => Question::FillInTheBlank(q),
            KnownQuestion::Writing(q) => Question::Writing(q),
        };
        Ok(question)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuestionKind {
    Mcq,
    Reading,
    FillInTheBlank,
    Writing,
    Unsupported,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::Mcq => "mcq",
            QuestionKind::Reading => "reading",
            QuestionKind::FillInTheBlank => "fill-in-the-blank",
            QuestionKind::Writing => "writing",
            QuestionKind::Unsupported => "unsupported",
        }
    }
}

impl Question {
    pub fn kind(&self) -> QuestionKind {
        match self {
            Question::Mcq(_) => QuestionKind::Mcq,
            Question::Reading(_) => QuestionKind::Reading,
            Question::FillInTheBlank(_) => QuestionKind::FillInTheBlank,
            Question::Writing(_) => QuestionKind::Writing,
            Question::Unsupported(_) => QuestionKind::Unsupported,
        }
    }

    pub fn id(&self) -> Option<&Id> {
        match self {
            Question::Mcq(q) => Some(&q.id),
            Question::Reading(q) => Some(&q.id),
            Question::FillInTheBlank(q) => Some(&q.id),
            Question::Writing(q) => Some(&q.id),
            Question::Unsupported(_) => None,
        }
    }

    pub fn id_mut(&mut self) -> Option<&mut Id> {
        match self {
            Question::Mcq(q) => Some(&mut q.id),
            Question::Reading(q) => Some(&mut q.id),
            Question::FillInTheBlank(q) => Some(&mut q.id),
            Question::Writing(q) => Some(&mut q.id),
            Question::Unsupported(_) => None,
        }
    }

    /// Nested sub-questions; empty for mcq, writing and unsupported.
    pub fn sub_questions(&self) -> &[SubQuestion] {
        match self {
            Question::Reading(q) => &q.questions,
            Question::FillInTheBlank(q) => &q.questions,
            Question::Mcq(_) | Question::Writing(_) | Question::Unsupported(_) => &[],
        }
    }

    pub fn sub_questions_mut(&mut self) -> Option<&mut Vec<SubQuestion>> {
        match self {
            Question::Reading(q) => Some(&mut q.questions),
            Question::FillInTheBlank(q) => Some(&mut q.questions),
            Question::Mcq(_) | Question::Writing(_) | Question::Unsupported(_) => None,
        }
    }

    /// Short label for collapsed list rows: the title, else the first ten
    /// words of the passage or text.
    pub fn preview(&self) -> String {
        let (title, body) = match self {
            Question::Reading(q) => (q.title.as_deref(), Some(q.passage.as_str())),
            Question::FillInTheBlank(q) => (q.title.as_deref(), Some(q.passage.as_str())),
            Question::Mcq(q) => (None, Some(q.text.as_str())),
            Question::Writing(q) => (None, Some(q.text.as_str())),
            Question::Unsupported(_) => (None, None),
        };

        if let Some(title) = title.filter(|t| !t.is_empty()) {
            return title.to_string();
        }

        match body.filter(|b| !b.is_empty()) {
            Some(html) => {
                let text = plain_text(html);
                let words: Vec<&str> = text.split(' ').take(10).collect();
                format!("{}...", words.join(" "))
            }
            None => "Question".to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

/// Legacy grouping; only ever seen on input and flattened away.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    #[serde(default)]
    pub id: Id,
    #[serde(default)]
    pub section_name: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

/// A named, ordered collection of questions.
///
/// Deserialization goes through [`RawTest`], so the legacy `sections` shape is
/// flattened wherever a test enters the system (import, storage load).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawTest")]
pub struct Test {
    pub id: Id,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
    pub questions: Vec<Question>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
}

impl Test {
    pub fn new(id: Id, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            created_date: None,
            questions: Vec::new(),
            question_count: Some(0),
            instruction: None,
        }
    }

    pub fn with_questions(mut self, questions: Vec<Question>) -> Self {
        self.questions = questions;
        self.refresh_question_count();
        self
    }

    /// Keeps the denormalized `questionCount` in step with `questions`.
    pub fn refresh_question_count(&mut self) {
        self.question_count = Some(self.questions.len());
    }

    pub fn find_question(&self, id: &Id) -> Option<&Question> {
        self.questions.iter().find(|q| q.id() == Some(id))
    }
}

/// Wire shape accepted for a test, including the legacy `sections` layout.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTest {
    #[serde(default)]
    id: Id,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    created_date: Option<String>,
    #[serde(default)]
    questions: Option<Vec<Question>>,
    #[serde(default)]
    sections: Option<Vec<Section>>,
    #[serde(default)]
    question_count: Option<usize>,
    #[serde(default)]
    instruction: Option<String>,
}

impl TryFrom<RawTest> for Test {
    type Error = String;

    fn try_from(raw: RawTest) -> Result<Self, Self::Error> {
        let questions = match (raw.questions, raw.sections) {
            (Some(questions), _) if !questions.is_empty() => questions,
            (_, Some(sections)) => sections
                .into_iter()
                .flat_map(|section| section.questions)
                .collect(),
            (Some(questions), None) => questions,
            (None, None) => {
                return Err("Test object must include a questions array".to_string());
            }
        };

        Ok(Test {
            id: raw.id,
            name: raw.name.unwrap_or_default(),
            description: raw.description.unwrap_or_default(),
            created_date: raw.created_date,
            questions,
            question_count: raw.question_count,
            instruction: raw.instruction,
        })
    }
}
