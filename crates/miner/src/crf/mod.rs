//! CRF module — labeled items, features, word classes, and tagging backends.

pub mod backend;
pub mod features;
pub mod items;
pub mod label_word;
pub mod perceptron;

pub use backend::{BackendError, FeatureSeq, SequenceBackend};
pub use features::FeatureExtractor;
pub use items::{LabeledCorpus, LabeledLine, Label, LineItem};
pub use label_word::{LabelWord, WordClass};
pub use perceptron::PerceptronBackend;
