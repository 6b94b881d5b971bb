//! Manager module — incremental line classification over a shared table.
//!
//! `LtManager` owns the Template Table, a Search Tree indexing its live
//! templates, and one generation strategy. Lines must be fed in input order;
//! id assignment depends on it. Template content changes only through the
//! explicit edit calls in `edit.rs`.

pub mod edit;

use crate::error::Result;
use crate::ltgen::{Outcome, TemplateGenerator};
use crate::template::{SearchTree, Template, TemplateTable, Tid};

pub use edit::EditRecord;

pub struct LtManager {
    table: TemplateTable,
    tree: SearchTree,
    gen: Box<dyn TemplateGenerator>,
    edits: Vec<EditRecord>,
}

impl LtManager {
    pub fn new(gen: Box<dyn TemplateGenerator>) -> Self {
        Self::with_table(gen, TemplateTable::new())
    }

    /// Resume from a previously persisted table; the index is rebuilt.
    pub fn with_table(gen: Box<dyn TemplateGenerator>, table: TemplateTable) -> Self {
        let mut tree = SearchTree::new();
        for (tid, tpl) in table.iter() {
            tree.insert(tpl, tid);
        }
        Self {
            table,
            tree,
            gen,
            edits: Vec::new(),
        }
    }

    /// Classify one line. Live templates, including edited ones, are
    /// consulted before the generator is asked for a new one.
    pub fn process_line(&mut self, words: &[String], seps: &[String]) -> Result<Outcome> {
        if let Some(tid) = self.tree.search(words) {
            tracing::trace!(tid, "template unchanged");
            return Ok(Outcome::Unchanged(tid));
        }
        let outcome = self.gen.process_line(&mut self.table, words, seps)?;
        match outcome {
            Outcome::Added(tid) => {
                let tpl = self.table.get(tid)?;
                let indexed = self.tree.insert(tpl, tid);
                assert_eq!(indexed, tid, "search index out of sync with template table");
                tracing::debug!(tid, "new template");
            }
            Outcome::Unchanged(tid) => tracing::trace!(tid, "template unchanged"),
            Outcome::Unmatched => tracing::trace!("line unmatched"),
        }
        Ok(outcome)
    }

    /// Classify lines in order, stopping at the first error.
    pub fn process_lines<I>(&mut self, lines: I) -> Result<Vec<Outcome>>
    where
        I: IntoIterator<Item = (Vec<String>, Vec<String>)>,
    {
        lines
            .into_iter()
            .map(|(words, seps)| self.process_line(&words, &seps))
            .collect()
    }

    /// Id of the live template matching `words`, preferring literal matches.
    pub fn search<S: AsRef<str>>(&self, words: &[S]) -> Option<Tid> {
        self.tree.search(words)
    }

    pub fn table(&self) -> &TemplateTable {
        &self.table
    }

    pub fn tree(&self) -> &SearchTree {
        &self.tree
    }

    pub fn get(&self, tid: Tid) -> Result<&Template> {
        self.table.get(tid)
    }

    /// Current id for `tid`, following merges.
    pub fn resolve(&self, tid: Tid) -> Result<Tid> {
        self.table.resolve(tid)
    }

    /// Edit history in application order.
    pub fn edits(&self) -> &[EditRecord] {
        &self.edits
    }

    pub fn into_table(self) -> TemplateTable {
        self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::{HeuristicConfig, ImportMode};
    use crate::crf::LabelWord;
    use crate::ltgen::{HeuristicGen, ImportGen, WordSplitter};

    fn heuristic() -> Box<dyn TemplateGenerator> {
        Box::new(HeuristicGen::new(LabelWord::default(), &HeuristicConfig::default()))
    }

    fn line(s: &str) -> (Vec<String>, Vec<String>) {
        let words: Vec<String> = s.split(' ').map(String::from).collect();
        let seps = vec![" ".to_string(); words.len()];
        (words, seps)
    }

    fn corpus() -> Vec<(Vec<String>, Vec<String>)> {
        [
            "job 1 done",
            "disk sda full",
            "job 2 done",
            "user alice login from 10.0.0.1",
            "disk sdb full",
            "user bob login from 10.0.0.2",
            "job 3 done",
        ]
        .iter()
        .map(|s| line(s))
        .collect()
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let run = || {
            let mut mgr = LtManager::new(heuristic());
            let outcomes = mgr.process_lines(corpus()).unwrap();
            let templates: Vec<_> = mgr.table().iter().map(|(t, tpl)| (t, tpl.clone())).collect();
            (outcomes, templates)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_outcome_sequence() {
        let mut mgr = LtManager::new(heuristic());
        let outcomes = mgr.process_lines(corpus()).unwrap();
        assert_eq!(
            outcomes,
            vec![
                Outcome::Added(0),
                Outcome::Added(1),
                Outcome::Unchanged(0),
                Outcome::Added(2),
                Outcome::Added(3),
                Outcome::Added(4),
                Outcome::Unchanged(0),
            ]
        );
    }

    #[test]
    fn test_every_added_template_is_searchable() {
        let mut mgr = LtManager::new(heuristic());
        for (words, seps) in corpus() {
            let tid = mgr.process_line(&words, &seps).unwrap().tid().unwrap();
            assert_eq!(mgr.search(&words), Some(tid));
        }
        assert_eq!(mgr.tree().len(), mgr.table().len());
    }

    #[test]
    fn test_unmatched_leaves_table_untouched() {
        let gen = ImportGen::from_reader("*", "job * done\n".as_bytes(), ImportMode::Plain, &WordSplitter).unwrap();
        let mut mgr = LtManager::new(Box::new(gen));
        let (w, s) = line("disk sda full");
        assert_eq!(mgr.process_line(&w, &s).unwrap(), Outcome::Unmatched);
        assert!(mgr.table().is_empty());
        assert!(mgr.tree().is_empty());
    }

    #[test]
    fn test_resume_from_table_keeps_ids() {
        let mut first = LtManager::new(heuristic());
        first.process_lines(corpus()).unwrap();
        let table = first.into_table();

        let mut resumed = LtManager::with_table(heuristic(), table);
        let (w, s) = line("job 9 done");
        assert_eq!(resumed.process_line(&w, &s).unwrap(), Outcome::Unchanged(0));
        let (w, s) = line("kernel panic");
        assert_eq!(resumed.process_line(&w, &s).unwrap(), Outcome::Added(5));
    }
}
