// Import commands - preview and commit exported test JSON

use std::path::PathBuf;

use crate::commands::mutate_store;
use crate::services::import_service::{parse_import, read_import_file, ImportPreview};
use crate::services::model::Id;
use crate::AppState;

/// Parses a JSON file without touching the store.
pub async fn import_preview_file(state: &AppState, path: String) -> Result<ImportPreview, String> {
    let path = PathBuf::from(&path);
    read_import_file(state.fs.as_ref(), &path)
        .await
        .map_err(|e| e.to_string())
}

/// Parses pasted JSON without touching the store.
pub async fn import_preview_json(json: String) -> Result<ImportPreview, String> {
    parse_import(&json).map_err(|e| e.to_string())
}

/// Adds every previewed test to the store, giving clock ids to anything
/// missing one and to tests whose id is already stored. Returns the ids the
/// tests were stored under; the last one is selected.
pub async fn import_commit(state: &AppState, mut preview: ImportPreview) -> Result<Vec<Id>, String> {
    let assigned = preview.assign_missing_ids(state.time.as_ref());
    let time = state.time.clone();

    let ids = mutate_store(state, move |store| {
        Ok(preview
            .tests
            .into_iter()
            .map(|test| store.import_test(test, time.as_ref()))
            .collect::<Vec<Id>>())
    })
    .await?;

    tracing::info!("Imported {} tests ({} ids assigned)", ids.len(), assigned);
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_test, test_state};
    use crate::traits::MockFileSystem;
    use crate::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_preview_then_commit() {
        let json = serde_json::to_string(&vec![sample_test()]).unwrap();
        let fs = MockFileSystem::new().with_file("/in/tests.json", json);
        let state = test_state(fs.clone());

        let preview = assert_ok!(import_preview_file(&state, "/in/tests.json".to_string()).await);
        assert_eq!(preview.question_count, sample_test().questions.len());
        assert!(state.store.read().await.tests().is_empty());

        let ids = assert_ok!(import_commit(&state, preview).await);
        assert_eq!(ids, vec![sample_test().id]);

        let store = state.store.read().await;
        assert_eq!(store.tests().len(), 1);
        assert_eq!(store.selected_test().map(|t| &t.id), Some(&ids[0]));
        assert!(fs.has_file("/data/tests-store.json"));
    }

    #[tokio::test]
    async fn test_commit_assigns_missing_ids() {
        let state = test_state(MockFileSystem::new());
        let preview = assert_ok!(
            import_preview_json(r#"{ "name": "Loose", "questions": [] }"#.to_string()).await
        );

        let ids = assert_ok!(import_commit(&state, preview).await);
        assert_eq!(ids, vec![Id::Number(1_704_067_200_000)]);
    }

    #[tokio::test]
    async fn test_importing_the_same_file_twice_keeps_ids_unique() {
        let json = serde_json::to_string(&vec![sample_test()]).unwrap();
        let fs = MockFileSystem::new().with_file("/in/tests.json", json);
        let state = test_state(fs);

        for _ in 0..2 {
            let preview = assert_ok!(import_preview_file(&state, "/in/tests.json".to_string()).await);
            assert_ok!(import_commit(&state, preview).await);
        }

        let store = state.store.read().await;
        let ids: Vec<&Id> = store.tests().iter().map(|t| &t.id).collect();
        assert_eq!(ids, vec![&sample_test().id, &Id::Number(1_704_067_200_000)]);
        assert_eq!(store.selected_test().map(|t| &t.id), Some(&Id::Number(1_704_067_200_000)));
        drop(store);

        assert_ok!(crate::commands::store::delete_test(&state, sample_test().id).await);
        assert_eq!(state.store.read().await.tests().len(), 1);
    }

    #[tokio::test]
    async fn test_preview_errors() {
        let state = test_state(MockFileSystem::new());

        let err = assert_err!(import_preview_json("[]".to_string()).await);
        assert_eq!(err, "Import file contains no tests");

        let err = assert_err!(import_preview_file(&state, "/missing.json".to_string()).await);
        assert!(err.starts_with("IO error"));
    }
}
