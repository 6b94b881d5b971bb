//! Template module — template model, deduplicated table, and search index.

pub mod model;
pub mod table;
pub mod tree;

pub use model::{Template, Tid, Token};
pub use table::TemplateTable;
pub use tree::SearchTree;
