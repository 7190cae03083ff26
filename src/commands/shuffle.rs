// Shuffle commands - generate shuffled variants of a stored test

use crate::commands::mutate_store;
use crate::services::model::{Id, Test};
use crate::services::shuffle::{validate_shuffle, ShuffleEngine, ShuffleValidation};
use crate::AppState;

pub async fn shuffle_validate(state: &AppState, test_id: Id) -> Result<ShuffleValidation, String> {
    let store = state.store.read().await;
    Ok(validate_shuffle(store.get_test(&test_id)))
}

/// Generates shuffled copies of the test and adds them to the store. The last
/// generated test becomes the selection.
pub async fn shuffle_test(state: &AppState, test_id: Id) -> Result<Vec<Test>, String> {
    let generated = {
        let store = state.store.read().await;
        let master = store.get_test(&test_id);

        let validation = validate_shuffle(master);
        match (validation.valid, master) {
            (true, Some(master)) => ShuffleEngine::new(state.time.clone()).generate_tests_random(master),
            _ => {
                return Err(validation
                    .error
                    .unwrap_or_else(|| "Cannot shuffle this test".to_string()))
            }
        }
    };

    let added = generated.clone();
    mutate_store(state, move |store| {
        for test in generated {
            store.add_test(test);
        }
        Ok(())
    })
    .await?;

    Ok(added)
}
