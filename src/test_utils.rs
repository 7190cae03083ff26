//! Shared test utilities and helpers.
//!
//! Fixtures for tests and questions, zip inspection helpers for exported
//! artifacts, and assertion macros.

#![allow(dead_code)]

use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::services::model::{
    FillInTheBlankQuestion, Id, McqQuestion, Question, ReadingQuestion, SubQuestion, Test,
    WritingQuestion,
};
use crate::services::test_store::{StorePersistence, TestStore};
use crate::traits::{MockFileSystem, MockTimeProvider};
use crate::AppState;

pub const STORE_PATH: &str = "/data/tests-store.json";

/// Empty app state over `fs` with the clock fixed at 2024-01-01. The mock
/// shares its contents across clones, so callers keep a handle for assertions.
pub fn test_state(fs: MockFileSystem) -> AppState {
    let fs = Arc::new(fs);
    AppState::new(
        TestStore::new(),
        StorePersistence::new(fs.clone(), STORE_PATH),
        fs,
        Arc::new(MockTimeProvider::from_millis(1_704_067_200_000)),
    )
}

/// An MCQ with plain string options.
pub fn mcq(id: i64, text: &str, options: &[&str], correct: i32) -> Question {
    Question::Mcq(McqQuestion {
        id: Id::Number(id),
        text: text.to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
        correct_answer: correct,
    })
}

pub fn sub_question(id: i64, text: &str, options: &[&str], correct: i32) -> SubQuestion {
    SubQuestion {
        id: Id::Number(id),
        text: text.to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
        correct_answer: correct,
    }
}

/// A test with every question kind. MCQ ids and option texts are distinct so
/// shuffled copies can be traced back to their source.
pub fn sample_test() -> Test {
    let mut test = Test::new(Id::Number(1_700_000_000_000), "Sample Test", "All question kinds")
        .with_questions(vec![
            mcq(101, "<p>What is 2 + 2?</p>", &["3", "4", "5", "22"], 1),
            mcq(
                102,
                "<p>Pick the <strong>largest</strong> planet.</p>",
                &["Mercury", "Jupiter", "Mars"],
                1,
            ),
            Question::Reading(ReadingQuestion {
                id: Id::Number(103),
                title: Some("The Fox".to_string()),
                passage: "<p>The quick brown fox jumps over the lazy dog.</p>".to_string(),
                questions: vec![
                    sub_question(104, "<p>What colour is the fox?</p>", &["Brown", "Red"], 0),
                    sub_question(105, "<p>What does the fox jump over?</p>", &["A log", "A dog"], 1),
                ],
            }),
            mcq(
                106,
                "<p>Which are primary colours?</p>",
                &["Red and blue", "Green and orange", "Purple and pink", "Black and white"],
                0,
            ),
            Question::FillInTheBlank(FillInTheBlankQuestion {
                id: Id::Number(107),
                title: None,
                passage: "<p>Water boils at {blank} degrees and freezes at {blank}.</p>"
                    .to_string(),
                questions: vec![
                    sub_question(108, "", &["100", "50"], 0),
                    sub_question(109, "", &["10", "0"], 1),
                ],
            }),
            Question::Writing(WritingQuestion {
                id: Id::Number(110),
                text: "<p>Describe your favourite season.</p>".to_string(),
                answer: "Any well-formed paragraph.".to_string(),
            }),
        ]);
    test.created_date = Some("2024-01-01".to_string());
    test
}

/// A store snapshot as the storage layer writes it.
pub fn sample_store_json() -> serde_json::Value {
    serde_json::json!({
        "state": {
            "tests": [serde_json::to_value(sample_test()).unwrap()],
            "selectedTest": null
        },
        "version": 0
    })
}

/// Raw bytes of a named entry in a zip archive.
pub fn read_zip_bytes(data: &[u8], name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data)).expect("valid ZIP");
    let mut file = archive
        .by_name(name)
        .unwrap_or_else(|_| panic!("missing zip entry {}", name));
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).expect("readable zip entry");
    bytes
}

/// A named entry in a zip archive as UTF-8 text.
pub fn read_zip_entry(data: &[u8], name: &str) -> String {
    String::from_utf8(read_zip_bytes(data, name)).expect("UTF-8 zip entry")
}

/// Entry names of a zip archive in stored order.
pub fn zip_file_names(data: &[u8]) -> Vec<String> {
    let archive = zip::ZipArchive::new(Cursor::new(data)).expect("valid ZIP");
    archive.file_names().map(String::from).collect()
}

/// Assert that two JSON values are equal, with better error messages.
#[macro_export]
macro_rules! assert_json_eq {
    ($left:expr, $right:expr) => {
        match (&$left, &$right) {
            (left_val, right_val) => {
                if *left_val != *right_val {
                    panic!(
                        "JSON values not equal:\n\nLeft:\n{}\n\nRight:\n{}\n",
                        serde_json::to_string_pretty(left_val).unwrap(),
                        serde_json::to_string_pretty(right_val).unwrap()
                    );
                }
            }
        }
    };
}

/// Assert that a result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a result is Err and return the error.
#[macro_export]
macro_rules! assert_err {
    ($result:expr) => {
        match $result {
            Ok(v) => panic!("Expected Err, got Ok: {:?}", v),
            Err(e) => e,
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sample_test_ids_are_unique() {
        let test = sample_test();
        let mut ids = HashSet::new();
        for question in &test.questions {
            assert!(ids.insert(question.id().unwrap().clone()));
            for sub in question.sub_questions() {
                assert!(ids.insert(sub.id.clone()));
            }
        }
        assert_eq!(test.question_count, Some(test.questions.len()));
    }

    #[test]
    fn test_sample_store_json_round_trips() {
        let json = sample_store_json();
        let test: Test = serde_json::from_value(json["state"]["tests"][0].clone()).unwrap();
        crate::assert_json_eq!(serde_json::to_value(&test).unwrap(), json["state"]["tests"][0]);
    }

    #[test]
    fn test_zip_helpers() {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("b.txt", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"second").unwrap();
        zip.start_file("a.txt", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"first").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        assert_eq!(zip_file_names(&bytes), vec!["b.txt", "a.txt"]);
        assert_eq!(read_zip_entry(&bytes, "a.txt"), "first");
    }
}
