// Import service for exported test JSON
// Parses a single test or a list of tests (including the legacy sections
// layout) into a preview that can be committed to the store

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use super::error::ImportError;
use super::model::{Id, Test};
use crate::traits::{FileSystem, TimeProvider};

/// Parsed tests shown to the user before they are added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    pub tests: Vec<Test>,
    /// Total number of top-level questions across all tests.
    pub question_count: usize,
}

impl ImportPreview {
    fn new(mut tests: Vec<Test>) -> Self {
        for test in &mut tests {
            test.refresh_question_count();
        }
        let question_count = tests.iter().map(|t| t.questions.len()).sum();
        Self {
            tests,
            question_count,
        }
    }

    /// Gives clock-derived ids to tests, questions and sub-questions that
    /// arrived without one. Returns how many ids were assigned.
    pub fn assign_missing_ids(&mut self, time: &dyn TimeProvider) -> usize {
        let base = time.unix_timestamp_millis();
        let mut assigned: i64 = 0;
        let mut fill = |id: &mut Id| {
            if id.is_unset() {
                *id = Id::Number(base + assigned);
                assigned += 1;
            }
        };

        for test in &mut self.tests {
            fill(&mut test.id);
            for question in &mut test.questions {
                if let Some(id) = question.id_mut() {
                    fill(id);
                }
                if let Some(subs) = question.sub_questions_mut() {
                    for sub in subs {
                        fill(&mut sub.id);
                    }
                }
            }
        }

        assigned as usize
    }
}

/// Accepts either one test object or an array of them.
pub fn parse_import(json: &str) -> Result<ImportPreview, ImportError> {
    let value: Value = serde_json::from_str(json)?;

    let tests: Vec<Test> = match value {
        Value::Array(_) => serde_json::from_value(value)?,
        Value::Object(_) => vec![serde_json::from_value(value)?],
        _ => {
            return Err(ImportError::Parse(
                "expected a test object or an array of tests".to_string(),
            ))
        }
    };

    if tests.is_empty() {
        return Err(ImportError::Empty);
    }

    let preview = ImportPreview::new(tests);
    tracing::info!(
        "Parsed import with {} tests and {} questions",
        preview.tests.len(),
        preview.question_count
    );
    Ok(preview)
}

pub async fn read_import_file(
    fs: &dyn FileSystem,
    path: &Path,
) -> Result<ImportPreview, ImportError> {
    tracing::debug!("Reading import file {}", path.display());
    let content = fs.read_to_string(path).await?;
    parse_import(&content)
}
