// Tests Store
// In-memory collection of tests with a current selection, persisted as a
// single JSON snapshot
//
// Snapshot file format (key "tests-store"):
// {
//   "state": { "tests": [...], "selectedTest": { ... } | null },
//   "version": 0
// }

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{QuizforgeError, Result};
use super::model::{Id, Question, SubQuestion, Test};
use crate::traits::{FileSystem, TimeProvider};

pub const STORE_KEY: &str = "tests-store";
const SNAPSHOT_VERSION: u32 = 0;

// ============================================================================
// Store
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestStore {
    tests: Vec<Test>,
    selected_test_id: Option<Id>,
}

impl TestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tests(&self) -> &[Test] {
        &self.tests
    }

    pub fn get_test(&self, id: &Id) -> Option<&Test> {
        self.tests.iter().find(|t| &t.id == id)
    }

    pub fn selected_test(&self) -> Option<&Test> {
        self.selected_test_id.as_ref().and_then(|id| self.get_test(id))
    }

    fn test_index(&self, id: &Id) -> Result<usize> {
        self.tests
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| QuizforgeError::TestNotFound(id.to_string()))
    }

    fn selected_mut(&mut self) -> Result<&mut Test> {
        let id = self
            .selected_test_id
            .clone()
            .ok_or(QuizforgeError::NoTestSelected)?;
        let index = self.test_index(&id)?;
        Ok(&mut self.tests[index])
    }

    // ------------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------------

    pub fn set_tests(&mut self, tests: Vec<Test>) {
        self.tests = tests;
    }

    /// `None` clears the selection.
    pub fn select_test(&mut self, id: Option<&Id>) -> Result<()> {
        if let Some(id) = id {
            self.test_index(id)?;
        }
        self.selected_test_id = id.cloned();
        Ok(())
    }

    /// Appends the test and makes it the selection.
    pub fn add_test(&mut self, test: Test) {
        self.selected_test_id = Some(test.id.clone());
        self.tests.push(test);
    }

    /// Adds a test that came from outside the store. An id already in use is
    /// replaced by a free clock id. Returns the id the test was stored under.
    pub fn import_test(&mut self, mut test: Test, time: &dyn TimeProvider) -> Id {
        if self.get_test(&test.id).is_some() || test.id.is_unset() {
            let mut millis = time.unix_timestamp_millis();
            while self.get_test(&Id::Number(millis)).is_some() {
                millis += 1;
            }
            debug!("Test id {} is taken, storing as {}", test.id, millis);
            test.id = Id::Number(millis);
        }

        let id = test.id.clone();
        self.add_test(test);
        id
    }

    pub fn update_test(&mut self, test: Test) -> Result<()> {
        let index = self.test_index(&test.id)?;
        self.tests[index] = test;
        Ok(())
    }

    /// Removes the test, clearing the selection if it was selected.
    pub fn delete_test(&mut self, id: &Id) -> Result<Test> {
        let index = self.test_index(id)?;
        if self.selected_test_id.as_ref() == Some(id) {
            self.selected_test_id = None;
        }
        Ok(self.tests.remove(index))
    }

    pub fn update_test_name(&mut self, id: &Id, name: impl Into<String>) -> Result<()> {
        let index = self.test_index(id)?;
        self.tests[index].name = name.into();
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Questions of the selected test
    // ------------------------------------------------------------------------

    /// Appends to the selected test, giving the question a clock id if it
    /// has none. Returns the question's id.
    pub fn add_question(&mut self, mut question: Question, time: &dyn TimeProvider) -> Result<Id> {
        let test = self.selected_mut()?;

        let id = match question.id_mut() {
            Some(id) => {
                if id.is_unset() {
                    *id = Id::Number(time.unix_timestamp_millis());
                }
                id.clone()
            }
            None => {
                return Err(QuizforgeError::InvalidInput(
                    "Unsupported question type".to_string(),
                ))
            }
        };

        test.questions.push(question);
        test.refresh_question_count();
        debug!("Added question {} to test {}", id, test.id);
        Ok(id)
    }

    /// Without `sub_question_id` removes the question itself; with one,
    /// removes that sub-question from the question.
    pub fn delete_question(&mut self, question_id: &Id, sub_question_id: Option<&Id>) -> Result<()> {
        let test = self.selected_mut()?;
        let not_found = || QuizforgeError::QuestionNotFound(question_id.to_string());

        let index = test
            .questions
            .iter()
            .position(|q| q.id() == Some(question_id))
            .ok_or_else(not_found)?;

        match sub_question_id {
            Some(sub_id) => {
                let subs = test.questions[index]
                    .sub_questions_mut()
                    .ok_or_else(not_found)?;
                let sub_index = subs
                    .iter()
                    .position(|s| &s.id == sub_id)
                    .ok_or_else(|| QuizforgeError::QuestionNotFound(sub_id.to_string()))?;
                subs.remove(sub_index);
            }
            None => {
                test.questions.remove(index);
            }
        }

        test.refresh_question_count();
        Ok(())
    }

    /// Replaces the top-level question with the same id.
    pub fn update_question(&mut self, question: Question) -> Result<()> {
        let id = question
            .id()
            .cloned()
            .ok_or_else(|| QuizforgeError::InvalidInput("Question has no id".to_string()))?;
        let test = self.selected_mut()?;

        let slot = test
            .questions
            .iter_mut()
            .find(|q| q.id() == Some(&id))
            .ok_or_else(|| QuizforgeError::QuestionNotFound(id.to_string()))?;
        *slot = question;
        Ok(())
    }

    /// Replaces the sub-question with the same id inside whichever reading or
    /// fill-in-the-blank question holds it.
    pub fn update_sub_question(&mut self, sub: SubQuestion) -> Result<()> {
        let test = self.selected_mut()?;

        let slot = test
            .questions
            .iter_mut()
            .filter_map(Question::sub_questions_mut)
            .flat_map(|subs| subs.iter_mut())
            .find(|s| s.id == sub.id)
            .ok_or_else(|| QuizforgeError::QuestionNotFound(sub.id.to_string()))?;
        *slot = sub;
        Ok(())
    }

    /// Moves the question at `from` to position `to`.
    pub fn reorder_question(&mut self, from: usize, to: usize) -> Result<()> {
        let test = self.selected_mut()?;
        let len = test.questions.len();
        if from >= len || to >= len {
            return Err(QuizforgeError::InvalidInput(format!(
                "Cannot move question {} to {} in a test of {}",
                from, to, len
            )));
        }

        let question = test.questions.remove(from);
        test.questions.insert(to, question);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Snapshot
    // ------------------------------------------------------------------------

    pub fn snapshot(&self) -> PersistedState {
        PersistedState {
            state: StoreSnapshot {
                tests: self.tests.clone(),
                selected_test: self.selected_test().cloned(),
            },
            version: SNAPSHOT_VERSION,
        }
    }

    /// A selection that no longer matches a stored test is dropped.
    pub fn from_snapshot(persisted: PersistedState) -> Self {
        let mut store = Self {
            tests: persisted.state.tests,
            selected_test_id: None,
        };
        if let Some(selected) = persisted.state.selected_test {
            if store.get_test(&selected.id).is_some() {
                store.selected_test_id = Some(selected.id);
            }
        }
        store
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    #[serde(default)]
    pub tests: Vec<Test>,
    #[serde(default)]
    pub selected_test: Option<Test>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub state: StoreSnapshot,
    #[serde(default)]
    pub version: u32,
}

// ============================================================================
// Persistence
// ============================================================================

/// Loads and saves the store snapshot through a [`FileSystem`].
pub struct StorePersistence {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl StorePersistence {
    pub fn new(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing snapshot yields an empty store.
    pub async fn load(&self) -> Result<TestStore> {
        if !self.fs.exists(&self.path).await {
            info!("No store snapshot at {}, starting empty", self.path.display());
            return Ok(TestStore::new());
        }

        let content = self.fs.read_to_string(&self.path).await?;
        let persisted: PersistedState = serde_json::from_str(&content)?;
        let store = TestStore::from_snapshot(persisted);

        info!(
            "Loaded {} tests from {}",
            store.tests().len(),
            self.path.display()
        );
        Ok(store)
    }

    /// Writes to a temp file first, then renames over the snapshot.
    pub async fn save(&self, store: &TestStore) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                self.fs.create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string(&store.snapshot())?;
        let temp_path = self.path.with_extension("json.tmp");

        self.fs.write(&temp_path, &json).await?;
        self.fs.rename(&temp_path, &self.path).await?;

        debug!("Saved store snapshot to {}", self.path.display());
        Ok(())
    }
}
