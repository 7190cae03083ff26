// Quizforge services

pub mod bundle_export;
pub mod config;
pub mod docx_export;
pub mod editing;
pub mod error;
pub mod import_service;
pub mod model;
pub mod rich_text;
pub mod shuffle;
pub mod test_store;
pub mod xlsx_export;
