//! Trait abstractions for dependency injection and testability.
//!
//! The file system and the clock are the only side effects of the crate;
//! both are injected so the store, id generation and shuffling can be tested
//! deterministically.

pub mod file_system;
pub mod time;

pub use file_system::{FileSystem, TokioFileSystem};
pub use time::{RealTimeProvider, TimeProvider};

#[cfg(test)]
pub use file_system::MockFileSystem;
#[cfg(test)]
pub use time::MockTimeProvider;
