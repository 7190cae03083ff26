// Store commands - tests and questions CRUD with persistence

use crate::commands::mutate_store;
use crate::services::editing::{
    new_fill_in_the_blank, new_mcq, new_reading, new_test, new_writing, validate_question,
    validate_test_name, ValidationErrors,
};
use crate::services::model::{Id, Question, QuestionKind, SubQuestion, Test};
use crate::AppState;

// ============================================================================
// Tests
// ============================================================================

pub async fn get_tests(state: &AppState) -> Result<Vec<Test>, String> {
    Ok(state.store.read().await.tests().to_vec())
}

pub async fn get_selected_test(state: &AppState) -> Result<Option<Test>, String> {
    Ok(state.store.read().await.selected_test().cloned())
}

pub async fn select_test(state: &AppState, test_id: Option<Id>) -> Result<(), String> {
    mutate_store(state, |store| store.select_test(test_id.as_ref())).await
}

/// Creates an empty test and selects it. A blank name is refused with the
/// validation message.
pub async fn create_test(state: &AppState, name: String, description: String) -> Result<Test, String> {
    if let Some(message) = validate_test_name(&name).get("name") {
        return Err(message.to_string());
    }

    let test = new_test(state.time.as_ref(), name.trim(), &description);
    let created = test.clone();
    mutate_store(state, move |store| {
        store.add_test(test);
        Ok(())
    })
    .await?;

    tracing::info!("Created test {} ({})", created.name, created.id);
    Ok(created)
}

/// Replaces the whole list, e.g. after a bulk import.
pub async fn set_tests(state: &AppState, tests: Vec<Test>) -> Result<(), String> {
    mutate_store(state, move |store| {
        store.set_tests(tests);
        Ok(())
    })
    .await
}

pub async fn update_test(state: &AppState, test: Test) -> Result<(), String> {
    mutate_store(state, move |store| store.update_test(test)).await
}

pub async fn delete_test(state: &AppState, test_id: Id) -> Result<Test, String> {
    let removed = mutate_store(state, |store| store.delete_test(&test_id)).await?;
    tracing::info!("Deleted test {} ({})", removed.name, removed.id);
    Ok(removed)
}

pub async fn rename_test(state: &AppState, test_id: Id, name: String) -> Result<(), String> {
    mutate_store(state, |store| store.update_test_name(&test_id, name)).await
}

// ============================================================================
// Questions
// ============================================================================

/// A blank question of the given kind with clock ids, not yet in any test.
pub async fn new_question(state: &AppState, kind: QuestionKind) -> Result<Question, String> {
    let time = state.time.as_ref();
    match kind {
        QuestionKind::Mcq => Ok(new_mcq(time)),
        QuestionKind::Reading => Ok(new_reading(time)),
        QuestionKind::FillInTheBlank => Ok(new_fill_in_the_blank(time)),
        QuestionKind::Writing => Ok(new_writing(time)),
        QuestionKind::Unsupported => Err("Unsupported question type".to_string()),
    }
}

pub async fn check_question(question: Question) -> Result<ValidationErrors, String> {
    Ok(validate_question(&question))
}

/// Adds to the selected test. Returns the question's id.
pub async fn add_question(state: &AppState, question: Question) -> Result<Id, String> {
    let time = state.time.clone();
    mutate_store(state, move |store| store.add_question(question, time.as_ref())).await
}

pub async fn update_question(state: &AppState, question: Question) -> Result<(), String> {
    mutate_store(state, move |store| store.update_question(question)).await
}

pub async fn update_sub_question(state: &AppState, sub_question: SubQuestion) -> Result<(), String> {
    mutate_store(state, move |store| store.update_sub_question(sub_question)).await
}

pub async fn delete_question(
    state: &AppState,
    question_id: Id,
    sub_question_id: Option<Id>,
) -> Result<(), String> {
    mutate_store(state, |store| {
        store.delete_question(&question_id, sub_question_id.as_ref())
    })
    .await
}

pub async fn reorder_question(state: &AppState, from: usize, to: usize) -> Result<(), String> {
    mutate_store(state, |store| store.reorder_question(from, to)).await
}
