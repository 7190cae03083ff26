// Bundle Export Service
// Packs the printable document, the answer key and the raw JSON of one test
// or of every test into a single zip archive

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::docx_export::{test_to_docx, DocxExportConfig};
use super::error::ExportError;
use super::model::Test;
use super::xlsx_export::tests_to_xlsx;

const COLLECTION_PREFIX: &str = "tests_collection";

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BundleOptions {
    /// Add the answer key workbook.
    pub include_answers: bool,
    /// Add the tests as pretty-printed JSON.
    pub include_json: bool,
    /// Instruction text printed at the top of a test's document, keyed by test id.
    pub instructions: HashMap<String, String>,
    pub docx: DocxExportConfig,
}

impl BundleOptions {
    fn instruction_for(&self, test: &Test) -> Option<String> {
        self.instructions
            .get(&test.id.to_string())
            .filter(|s| !s.is_empty())
            .cloned()
    }
}

/// A finished archive and the name it should be saved under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

// ============================================================================
// Helpers
// ============================================================================

/// Test name with spaces replaced by underscores, `test` when unnamed.
pub fn file_stem(name: &str) -> String {
    if name.is_empty() {
        "test".to_string()
    } else {
        name.replace(' ', "_")
    }
}

struct BundleWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
}

impl BundleWriter {
    fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            options: SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated),
        }
    }

    fn add(&mut self, name: &str, bytes: &[u8]) -> Result<(), ExportError> {
        self.zip.start_file(name, self.options)?;
        self.zip.write_all(bytes)?;
        tracing::debug!("Added {} ({} bytes) to bundle", name, bytes.len());
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>, ExportError> {
        Ok(self.zip.finish()?.into_inner())
    }
}

/// Hands out archive entry stems, suffixing `_2`, `_3`, ... onto repeats so
/// tests sharing a name do not collide.
#[derive(Default)]
struct UniqueNames {
    used: HashSet<String>,
}

impl UniqueNames {
    fn claim(&mut self, stem: &str) -> String {
        let mut candidate = stem.to_string();
        let mut n = 2;
        while !self.used.insert(candidate.clone()) {
            candidate = format!("{}_{}", stem, n);
            n += 1;
        }
        candidate
    }
}

/// The document copy of a test carries the caller's instruction; the
/// answer key and JSON use the test as stored.
fn document_copy(test: &Test, options: &BundleOptions) -> Test {
    Test {
        instruction: options.instruction_for(test),
        ..test.clone()
    }
}

// ============================================================================
// Export
// ============================================================================

/// Bundles a single test. Refuses a test without questions.
pub fn export_test_bundle(test: &Test, options: &BundleOptions) -> Result<ExportBundle, ExportError> {
    if test.questions.is_empty() {
        return Err(ExportError::NoQuestions(test.name.clone()));
    }

    let stem = file_stem(&test.name);
    let base = format!("{}_{}", stem, stem);
    let mut writer = BundleWriter::new();

    let docx = test_to_docx(&document_copy(test, options), &options.docx, |_| {})?;
    writer.add(&format!("{}.docx", base), &docx)?;

    if options.include_answers {
        if let Some(xlsx) = tests_to_xlsx(std::slice::from_ref(test))? {
            writer.add(&format!("{}_answers.xlsx", base), &xlsx)?;
        }
    }

    if options.include_json {
        let json = serde_json::to_string_pretty(test)?;
        writer.add(&format!("{}.json", base), json.as_bytes())?;
    }

    let bundle = ExportBundle {
        file_name: format!("{}.zip", base),
        bytes: writer.finish()?,
    };
    tracing::info!("Exported bundle {}", bundle.file_name);
    Ok(bundle)
}

/// Bundles every test. Tests without questions get no document but still
/// appear in the answer key and JSON.
pub fn export_collection_bundle(
    tests: &[Test],
    options: &BundleOptions,
) -> Result<ExportBundle, ExportError> {
    if tests.is_empty() {
        return Err(ExportError::NothingToExport);
    }

    let mut writer = BundleWriter::new();
    let mut names = UniqueNames::default();
    let mut documents = 0;

    for test in tests {
        if test.questions.is_empty() {
            tracing::warn!("Skipping test \"{}\" because it has no questions", test.name);
            continue;
        }
        let docx = test_to_docx(&document_copy(test, options), &options.docx, |_| {})?;
        let stem = names.claim(&format!("{}_{}", COLLECTION_PREFIX, file_stem(&test.name)));
        writer.add(&format!("{}.docx", stem), &docx)?;
        documents += 1;
    }

    if options.include_answers {
        if let Some(xlsx) = tests_to_xlsx(tests)? {
            writer.add(&format!("{}_answers.xlsx", COLLECTION_PREFIX), &xlsx)?;
        }
    }

    if options.include_json {
        let json = serde_json::to_string_pretty(tests)?;
        writer.add(&format!("{}.json", COLLECTION_PREFIX), json.as_bytes())?;
    }

    let bundle = ExportBundle {
        file_name: format!("{}_all_tests.zip", COLLECTION_PREFIX),
        bytes: writer.finish()?,
    };
    tracing::info!(
        "Exported collection bundle with {} of {} tests",
        documents,
        tests.len()
    );
    Ok(bundle)
}
