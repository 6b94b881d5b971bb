//! Backend — contract of the sequence-labeling engine behind the CRF strategy.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Per-token feature strings of one line.
pub type FeatureSeq = Vec<Vec<String>>;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("No model loaded")]
    ModelNotLoaded,
    #[error("Training set is empty")]
    EmptyTrainingSet,
    #[error("Sequence shape mismatch: {features} feature rows, {labels} labels")]
    ShapeMismatch { features: usize, labels: usize },
    #[error("Corrupt model at {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("Backend I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opaque trainable sequence tagger.
///
/// `train` persists a model artifact and returns its path; `open` loads an
/// artifact for tagging. Implementations never retry on failure.
pub trait SequenceBackend: Send {
    fn train(
        &mut self,
        xseqs: &[FeatureSeq],
        yseqs: &[Vec<String>],
        model_path: &Path,
    ) -> Result<PathBuf, BackendError>;

    fn open(&mut self, model_path: &Path) -> Result<(), BackendError>;

    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// One label per feature row.
    fn tag(&self, xseq: &FeatureSeq) -> Result<Vec<String>, BackendError>;
}
