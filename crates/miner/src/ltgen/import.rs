//! Import — template generation by matching a pre-loaded definition catalog.
//!
//! Definitions live in their own id namespace. A matching line is bridged into
//! the shared Template Table by content, never by definition id.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, info};

use crate::conf::{ImportMode, MinerConfig};
use crate::error::{MinerError, Result};
use crate::template::{SearchTree, Template, TemplateTable};
use super::split::Tokenizer;
use super::traits::{Outcome, TemplateGenerator};

/// Definition id, independent of template ids.
pub type DefId = usize;

pub struct ImportGen {
    definitions: TemplateTable,
    tree: SearchTree,
}

impl ImportGen {
    pub fn new(
        sym: &str,
        def_path: impl AsRef<Path>,
        mode: ImportMode,
        tokenizer: &dyn Tokenizer,
    ) -> Result<Self> {
        let def_path = def_path.as_ref();
        if !def_path.is_file() {
            return Err(MinerError::Definition(format!(
                "definition catalog not found at {}",
                def_path.display()
            )));
        }
        let file = File::open(def_path)?;
        Self::from_reader(sym, BufReader::new(file), mode, tokenizer)
    }

    pub fn from_config(conf: &MinerConfig, tokenizer: &dyn Tokenizer) -> Result<Self> {
        Self::new(
            &conf.variable_symbol,
            &conf.import.def_path,
            conf.import.mode,
            tokenizer,
        )
    }

    /// Build from catalog text, one definition per line.
    pub fn from_reader(
        sym: &str,
        reader: impl BufRead,
        mode: ImportMode,
        tokenizer: &dyn Tokenizer,
    ) -> Result<Self> {
        let mut definitions = TemplateTable::new();
        let mut tree = SearchTree::new();
        let mut count = 0usize;

        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let message = match mode {
                ImportMode::Plain => line.as_str(),
                ImportMode::Ids => line.split_once(' ').map(|(_, m)| m.trim()).unwrap_or(""),
            };
            let (words, _) = tokenizer.split(message);
            if words.is_empty() {
                debug!(line = lineno + 1, "skipping empty definition");
                continue;
            }
            let tpl = Template::from_words(&words, sym);
            let defid = definitions.add(tpl.clone());
            tree.insert(&tpl, defid);
            count += 1;
        }

        info!("{} template definitions imported ({} distinct)", count, definitions.len());
        Ok(Self { definitions, tree })
    }

    pub fn definitions(&self) -> &TemplateTable {
        &self.definitions
    }

    pub fn search<S: AsRef<str>>(&self, words: &[S]) -> Option<DefId> {
        self.tree.search(words)
    }
}

impl TemplateGenerator for ImportGen {
    fn name(&self) -> &'static str {
        "import"
    }

    fn generate(&mut self, words: &[String], _seps: &[String]) -> Result<Option<Template>> {
        match self.search(words) {
            Some(defid) => Ok(Some(self.definitions.get(defid)?.clone())),
            None => {
                debug!("No log template found for message: {:?}", words);
                Ok(None)
            }
        }
    }
}

/// Raw lines that match no definition, in input order.
pub fn search_exception<I>(gen: &mut ImportGen, table: &mut TemplateTable, lines: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = (String, Vec<String>, Vec<String>)>,
{
    let mut unmatched = Vec::new();
    for (raw, words, seps) in lines {
        if let Outcome::Unmatched = gen.process_line(table, &words, &seps)? {
            unmatched.push(raw);
        }
    }
    Ok(unmatched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ltgen::split::WordSplitter;
    use crate::ltgen::traits::Transition;

    fn words(s: &str) -> Vec<String> {
        s.split(' ').map(String::from).collect()
    }

    fn catalog(text: &str, mode: ImportMode) -> ImportGen {
        ImportGen::from_reader("*", text.as_bytes(), mode, &WordSplitter).unwrap()
    }

    #[test]
    fn test_definition_scenario() {
        let mut gen = catalog("ERROR * failed\nINFO user * login\n", ImportMode::Plain);
        let mut table = TemplateTable::new();
        let line = words("ERROR disk0 failed");
        let seps = vec![" ".to_string(); 3];

        let first = gen.process_line(&mut table, &line, &seps).unwrap();
        assert_eq!(first, Outcome::Added(0));
        let again = gen.process_line(&mut table, &line, &seps).unwrap();
        assert_eq!(again, Outcome::Unchanged(0));

        let miss = gen.process_line(&mut table, &words("WARN low memory"), &seps).unwrap();
        assert_eq!(miss, Outcome::Unmatched);
        assert_eq!(miss.tid(), None);
        assert_eq!(miss.transition(), Transition::Unmatched);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_ids_are_bridged_by_content() {
        let mut gen = catalog("ERROR * failed\nINFO user * login\n", ImportMode::Plain);
        let mut table = TemplateTable::new();
        let seps = vec![" ".to_string(); 4];
        // second definition seen first gets template id 0
        let out = gen.process_line(&mut table, &words("INFO user bob login"), &seps).unwrap();
        assert_eq!(out, Outcome::Added(0));
        assert_eq!(gen.search(&words("INFO user bob login")), Some(1));
    }

    #[test]
    fn test_never_adds_content_outside_catalog() {
        let mut gen = catalog("a *\nb c\n", ImportMode::Plain);
        let mut table = TemplateTable::new();
        let inputs = ["a 1", "b c", "b d", "c c", "a 2", "a"];
        for input in inputs {
            let w = words(input);
            let s = vec![" ".to_string(); w.len()];
            if let Outcome::Added(tid) = gen.process_line(&mut table, &w, &s).unwrap() {
                assert!(gen.definitions().exists(table.get(tid).unwrap()));
            }
        }
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_ids_mode_strips_leading_id() {
        let gen = catalog("7 ERROR * failed\n12 INFO user * login\n", ImportMode::Ids);
        assert_eq!(gen.definitions().len(), 2);
        assert_eq!(gen.search(&words("ERROR sda failed")), Some(0));
        assert_eq!(gen.search(&words("7 ERROR sda failed")), None);
    }

    #[test]
    fn test_duplicate_and_blank_definitions() {
        let gen = catalog("a *\n\na *\n", ImportMode::Plain);
        assert_eq!(gen.definitions().len(), 1);
    }

    #[test]
    fn test_missing_catalog_is_definition_error() {
        let err = ImportGen::new("*", "/nonexistent/defs.txt", ImportMode::Plain, &WordSplitter)
            .err()
            .unwrap();
        assert!(matches!(err, MinerError::Definition(_)));
    }

    #[test]
    fn test_search_exception_reports_raw_lines() {
        let mut gen = catalog("ERROR * failed\n", ImportMode::Plain);
        let mut table = TemplateTable::new();
        let lines = ["ERROR sda failed", "WARN low memory", "ERROR x y failed"]
            .iter()
            .map(|raw| {
                let (w, s) = WordSplitter.split(raw);
                (raw.to_string(), w, s)
            })
            .collect::<Vec<_>>();
        let unmatched = search_exception(&mut gen, &mut table, lines).unwrap();
        assert_eq!(unmatched, vec!["WARN low memory", "ERROR x y failed"]);
    }

    #[test]
    fn test_exported_table_reimports() {
        let mut table = TemplateTable::new();
        table.add(Template::from_words(&["ERROR", "*", "failed"], "*"));
        let text = table.export_definitions("*", ImportMode::Ids);
        let gen = catalog(&text, ImportMode::Ids);
        assert_eq!(gen.search(&words("ERROR sdb failed")), Some(0));
    }
}
