//! Traits — the generation strategy contract, its per-line outcome, and the
//! train-then-persist lifecycle shared by learned strategies.

use std::path::PathBuf;

use crate::crf::LineItem;
use crate::error::Result;
use crate::template::{Template, TemplateTable, Tid};

/// Per-line classification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Unchanged,
    Added,
    Unmatched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The line matched a template already in the table.
    Unchanged(Tid),
    /// The line created a new template.
    Added(Tid),
    /// No definition satisfies the line; the table was not touched.
    Unmatched,
}

impl Outcome {
    pub fn tid(&self) -> Option<Tid> {
        match self {
            Outcome::Unchanged(tid) | Outcome::Added(tid) => Some(*tid),
            Outcome::Unmatched => None,
        }
    }

    pub fn transition(&self) -> Transition {
        match self {
            Outcome::Unchanged(_) => Transition::Unchanged,
            Outcome::Added(_) => Transition::Added,
            Outcome::Unmatched => Transition::Unmatched,
        }
    }
}

/// Look up or insert `tpl`, reporting whether it was new.
pub fn commit(table: &mut TemplateTable, tpl: Template) -> Outcome {
    match table.add_tracked(tpl) {
        (tid, true) => Outcome::Added(tid),
        (tid, false) => Outcome::Unchanged(tid),
    }
}

pub trait TemplateGenerator: Send {
    fn name(&self) -> &'static str;

    /// Template proposed for a tokenized line; `None` when nothing applies.
    fn generate(&mut self, words: &[String], seps: &[String]) -> Result<Option<Template>>;

    fn process_line(
        &mut self,
        table: &mut TemplateTable,
        words: &[String],
        seps: &[String],
    ) -> Result<Outcome> {
        Ok(match self.generate(words, seps)? {
            Some(tpl) => commit(table, tpl),
            None => Outcome::Unmatched,
        })
    }
}

/// Training lifecycle for strategies backed by a learned model.
pub trait Trainable {
    /// Fit on fully labeled lines and persist the model; returns its path.
    fn train<'a, I>(&mut self, lines: I) -> Result<PathBuf>
    where
        I: IntoIterator<Item = &'a [LineItem]>;

    /// Load the persisted model for tagging.
    fn init_tagger(&mut self) -> Result<()>;

    fn close_tagger(&mut self);
}
