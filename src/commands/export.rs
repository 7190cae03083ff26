// Export commands
// Handles DOCX, answer key and bundle export of stored tests

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::services::bundle_export::{
    export_collection_bundle, export_test_bundle, file_stem, BundleOptions, ExportBundle,
};
use crate::services::docx_export::{test_to_docx, DocxExportConfig, ExportProgress};
use crate::services::error::ExportError;
use crate::services::model::{Id, Test};
use crate::services::xlsx_export::tests_to_xlsx;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportResult {
    pub success: bool,
    pub path: Option<String>,
    pub error: Option<String>,
}

impl ExportResult {
    fn written(path: &Path) -> Self {
        Self {
            success: true,
            path: Some(path.to_string_lossy().to_string()),
            error: None,
        }
    }

    fn failed(error: ExportError) -> Self {
        tracing::warn!("Export failed: {}", error);
        Self {
            success: false,
            path: None,
            error: Some(error.to_string()),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

async fn find_test(state: &AppState, test_id: &Id) -> Result<Test, String> {
    state
        .store
        .read()
        .await
        .get_test(test_id)
        .cloned()
        .ok_or_else(|| format!("Test not found: {}", test_id))
}

async fn write_artifact(state: &AppState, path: &Path, bytes: &[u8]) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            state
                .fs
                .create_dir_all(parent)
                .await
                .map_err(|e| format!("Failed to create directory: {}", e))?;
        }
    }

    state
        .fs
        .write_bytes(path, bytes)
        .await
        .map_err(|e| format!("Failed to write file: {}", e))
}

/// Runs a document build off the async runtime.
async fn run_blocking<T, F>(build: F) -> Result<Result<T, ExportError>, String>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ExportError> + Send + 'static,
{
    tokio::task::spawn_blocking(build)
        .await
        .map_err(|e| format!("Task failed: {}", e))
}

/// Suggested file name for a single test's printable document.
pub fn default_docx_name(test: &Test) -> String {
    format!("{}.docx", file_stem(&test.name))
}

// ============================================================================
// Commands
// ============================================================================

/// Exports a stored test to DOCX at `output_path`.
pub async fn export_to_docx<F>(
    state: &AppState,
    test_id: Id,
    config: DocxExportConfig,
    output_path: String,
    on_progress: F,
) -> Result<ExportResult, String>
where
    F: Fn(ExportProgress) + Send + 'static,
{
    let test = find_test(state, &test_id).await?;

    let result = run_blocking(move || test_to_docx(&test, &config, on_progress)).await?;

    match result {
        Ok(bytes) => {
            let path = PathBuf::from(&output_path);
            write_artifact(state, &path, &bytes).await?;
            tracing::info!("Exported DOCX to {}", path.display());
            Ok(ExportResult::written(&path))
        }
        Err(e) => Ok(ExportResult::failed(e)),
    }
}

/// Writes the answer key for the given tests, or for every stored test when
/// `test_ids` is empty.
pub async fn export_answer_key(
    state: &AppState,
    test_ids: Vec<Id>,
    output_path: String,
) -> Result<ExportResult, String> {
    let tests: Vec<Test> = {
        let store = state.store.read().await;
        if test_ids.is_empty() {
            store.tests().to_vec()
        } else {
            test_ids
                .iter()
                .map(|id| {
                    store
                        .get_test(id)
                        .cloned()
                        .ok_or_else(|| format!("Test not found: {}", id))
                })
                .collect::<Result<_, _>>()?
        }
    };

    let result = run_blocking(move || tests_to_xlsx(&tests)).await?;

    match result {
        Ok(Some(bytes)) => {
            let path = PathBuf::from(&output_path);
            write_artifact(state, &path, &bytes).await?;
            tracing::info!("Exported answer key to {}", path.display());
            Ok(ExportResult::written(&path))
        }
        Ok(None) => Ok(ExportResult::failed(ExportError::NothingToExport)),
        Err(e) => Ok(ExportResult::failed(e)),
    }
}

async fn write_bundle(
    state: &AppState,
    result: Result<ExportBundle, ExportError>,
    output_dir: &str,
) -> Result<ExportResult, String> {
    match result {
        Ok(bundle) => {
            let path = Path::new(output_dir).join(&bundle.file_name);
            write_artifact(state, &path, &bundle.bytes).await?;
            Ok(ExportResult::written(&path))
        }
        Err(e) => Ok(ExportResult::failed(e)),
    }
}

/// Writes `<name>_<name>.zip` for one test into `output_dir`.
pub async fn export_bundle(
    state: &AppState,
    test_id: Id,
    options: BundleOptions,
    output_dir: String,
) -> Result<ExportResult, String> {
    let test = find_test(state, &test_id).await?;
    let result = run_blocking(move || export_test_bundle(&test, &options)).await?;
    write_bundle(state, result, &output_dir).await
}

/// Writes `tests_collection_all_tests.zip` with every stored test into `output_dir`.
pub async fn export_all_bundle(
    state: &AppState,
    options: BundleOptions,
    output_dir: String,
) -> Result<ExportResult, String> {
    let tests = state.store.read().await.tests().to_vec();
    let result = run_blocking(move || export_collection_bundle(&tests, &options)).await?;
    write_bundle(state, result, &output_dir).await
}
