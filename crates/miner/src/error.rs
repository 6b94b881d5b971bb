//! Error taxonomy for template mining.

use std::path::PathBuf;
use thiserror::Error;

use crate::crf::BackendError;

#[derive(Error, Debug)]
pub enum MinerError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Labeling error: {0}")]
    Labeling(String),
    #[error("No trained model found at {}", .0.display())]
    ModelNotFound(PathBuf),
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("Invalid edit: {0}")]
    InvalidEdit(String),
    #[error("Definition error: {0}")]
    Definition(String),
    #[error("Corpus parse error at line {line}: {source}")]
    Corpus {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MinerError {
    /// `NotFound` is the only variant a caller may treat as "no match".
    pub fn is_not_found(&self) -> bool {
        matches!(self, MinerError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, MinerError>;
