//! Error types for notebook loading

use thiserror::Error;

/// Error produced while turning a notebook source into a document
#[derive(Error, Debug)]
pub enum NotebookError {
    /// The bytes could not be decoded into a notebook structure
    #[error("Failed to parse notebook: {0}")]
    Parse(String),

    /// The underlying file or transport read failed
    #[error("Failed to read notebook '{name}': {source}")]
    LoadIo {
        /// Name of the source being read
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl NotebookError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Whether this is a malformed-document error (as opposed to a read failure)
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}

impl From<serde_json::Error> for NotebookError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result type alias for notebook operations
pub type Result<T> = std::result::Result<T, NotebookError>;
