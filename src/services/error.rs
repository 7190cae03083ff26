// Error types for Quizforge services

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuizforgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Test not found: {0}")]
    TestNotFound(String),

    #[error("Question not found: {0}")]
    QuestionNotFound(String),

    #[error("No test selected")]
    NoTestSelected,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Export-specific errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExportError {
    #[error("Test \"{0}\" has no questions to export")]
    NoQuestions(String),

    #[error("No tests to export")]
    NothingToExport,

    #[error("Rich text parsing error: {0}")]
    RichText(String),

    #[error("Failed to build DOCX: {0}")]
    Docx(String),

    #[error("ZIP error: {0}")]
    Zip(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Io(err.to_string())
    }
}

impl From<zip::result::ZipError> for ExportError {
    fn from(err: zip::result::ZipError) -> Self {
        ExportError::Zip(err.to_string())
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Json(err.to_string())
    }
}

impl serde::Serialize for ExportError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Import-specific errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImportError {
    #[error("Failed to parse import file: {0}")]
    Parse(String),

    #[error("Import file contains no tests")]
    Empty,

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::Parse(err.to_string())
    }
}

impl serde::Serialize for ImportError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, QuizforgeError>;
