// Module structure for the log template miner.

// Core model
pub mod template;
pub mod error;
pub mod conf;

// Sequence labeling
pub mod crf;

// Generation and classification
pub mod ltgen;
pub mod manager;

pub use error::{MinerError, Result};
pub use manager::{EditRecord, LtManager};
pub use template::{SearchTree, Template, TemplateTable, Tid, Token};
