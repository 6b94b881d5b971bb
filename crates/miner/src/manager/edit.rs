//! Edit — manual template restructuring.
//!
//! Every edit keeps the table bijective and the search index in step with it.
//! Retired ids stay resolvable through their redirect; ids are never reused.

use serde::Serialize;
use tracing::info;

use super::LtManager;
use crate::error::{MinerError, Result};
use crate::template::{Template, Tid, Token};

/// What an applied edit did to the id space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum EditRecord {
    /// `retired` now resolves to `survivor`.
    Merged { survivor: Tid, retired: Tid },
    /// Same id, new content.
    Replaced { tid: Tid },
    /// `source` kept the first variant; the rest received fresh ids.
    Split { source: Tid, into: Vec<Tid> },
    Separated { source: Tid, new: Tid },
}

impl LtManager {
    /// Generalize `keep` to cover `retire` and retire the latter.
    ///
    /// Positions where the two disagree become variables.
    pub fn merge(&mut self, keep: Tid, retire: Tid) -> Result<EditRecord> {
        if keep == retire {
            return Err(MinerError::InvalidEdit(format!("cannot merge {} into itself", keep)));
        }
        for tid in [keep, retire] {
            if self.table.is_retired(tid) {
                return Err(MinerError::InvalidEdit(format!(
                    "template {} is retired; edit {} instead",
                    tid,
                    self.table.resolve(tid)?
                )));
            }
        }
        let kept = self.table.get(keep)?.clone();
        let retired = self.table.get(retire)?.clone();
        if kept.len() != retired.len() {
            return Err(MinerError::InvalidEdit(format!(
                "templates {} and {} differ in length ({} vs {})",
                keep,
                retire,
                kept.len(),
                retired.len()
            )));
        }

        let mut merged = kept.clone();
        for position in kept.diff_positions(&retired) {
            merged = merged.with_token(position, Token::Var);
        }
        if let Ok(owner) = self.table.get_tid(&merged) {
            if owner != keep && owner != retire {
                return Err(MinerError::InvalidEdit(format!(
                    "merged content already owned by template {}",
                    owner
                )));
            }
        }

        self.tree.remove(&retired);
        self.table.retire(retire, keep)?;
        self.swap_content(keep, &kept, merged)?;

        info!(keep, retire, "merged templates");
        self.record(EditRecord::Merged {
            survivor: keep,
            retired: retire,
        })
    }

    /// Fix the variable at `position` to each of `words`.
    ///
    /// `tid` takes the first variant; the others become new templates. Fails
    /// if any variant already exists.
    pub fn split<S: AsRef<str>>(&mut self, tid: Tid, position: usize, words: &[S]) -> Result<EditRecord> {
        let source = self.table.get(tid)?.clone();
        self.expect_token(tid, &source, position, true)?;
        if words.is_empty() {
            return Err(MinerError::InvalidEdit("split needs at least one word".into()));
        }

        let mut variants: Vec<Template> = Vec::with_capacity(words.len());
        for word in words {
            let variant = source.with_token(position, Token::Word(word.as_ref().to_string()));
            if variants.contains(&variant) {
                continue;
            }
            if let Ok(owner) = self.table.get_tid(&variant) {
                return Err(MinerError::InvalidEdit(format!(
                    "variant {:?} already exists as template {}",
                    word.as_ref(),
                    owner
                )));
            }
            variants.push(variant);
        }

        let mut variants = variants.into_iter();
        let mut into = Vec::new();
        if let Some(first) = variants.next() {
            self.swap_content(tid, &source, first)?;
            into.push(tid);
        }
        for variant in variants {
            let new = self.table.add(variant);
            let tpl = self.table.get(new)?;
            self.tree.insert(tpl, new);
            into.push(new);
        }

        info!(tid, position, count = into.len(), "split template");
        self.record(EditRecord::Split { source: tid, into })
    }

    /// Replace variables with fixed words, one `(position, word)` per change.
    ///
    /// If the result already exists under another id, `tid` is merged into it.
    pub fn fix<S: AsRef<str>>(&mut self, tid: Tid, assignments: &[(usize, S)]) -> Result<EditRecord> {
        let current = self.table.get(tid)?.clone();
        let mut edited = current.clone();
        for (position, word) in assignments {
            self.expect_token(tid, &current, *position, true)?;
            edited = edited.with_token(*position, Token::Word(word.as_ref().to_string()));
        }
        self.change_content(tid, current, edited)
    }

    /// Turn fixed words at `positions` into variables.
    ///
    /// If the result already exists under another id, `tid` is merged into it.
    pub fn free(&mut self, tid: Tid, positions: &[usize]) -> Result<EditRecord> {
        let current = self.table.get(tid)?.clone();
        let mut edited = current.clone();
        for &position in positions {
            self.expect_token(tid, &current, position, false)?;
            edited = edited.with_token(position, Token::Var);
        }
        self.change_content(tid, current, edited)
    }

    /// Register a specialization of `tid` as its own template.
    pub fn separate(&mut self, tid: Tid, special: Template) -> Result<EditRecord> {
        let general = self.table.get(tid)?;
        if special == *general || !special.is_specialization_of(general) {
            return Err(MinerError::InvalidEdit(format!(
                "not a strict specialization of template {}",
                tid
            )));
        }
        if let Ok(owner) = self.table.get_tid(&special) {
            return Err(MinerError::InvalidEdit(format!(
                "specialization already exists as template {}",
                owner
            )));
        }
        let new = self.table.add(special);
        let tpl = self.table.get(new)?;
        self.tree.insert(tpl, new);

        info!(tid, new, "separated template");
        self.record(EditRecord::Separated { source: tid, new })
    }

    fn change_content(&mut self, tid: Tid, current: Template, edited: Template) -> Result<EditRecord> {
        if edited == current {
            return self.record(EditRecord::Replaced { tid });
        }
        match self.table.get_tid(&edited) {
            Ok(owner) => {
                self.tree.remove(&current);
                self.table.retire(tid, owner)?;
                info!(tid, owner, "edited content collides, merged");
                self.record(EditRecord::Merged {
                    survivor: owner,
                    retired: tid,
                })
            }
            Err(e) if e.is_not_found() => {
                self.swap_content(tid, &current, edited)?;
                info!(tid, "replaced template content");
                self.record(EditRecord::Replaced { tid })
            }
            Err(e) => Err(e),
        }
    }

    fn swap_content(&mut self, tid: Tid, old: &Template, new: Template) -> Result<()> {
        self.tree.remove(old);
        self.table.replace(tid, new)?;
        let tpl = self.table.get(tid)?;
        self.tree.insert(tpl, tid);
        Ok(())
    }

    fn expect_token(&self, tid: Tid, tpl: &Template, position: usize, want_var: bool) -> Result<()> {
        let token = tpl.tokens().get(position).ok_or_else(|| {
            MinerError::InvalidEdit(format!(
                "position {} out of range for template {} (length {})",
                position,
                tid,
                tpl.len()
            ))
        })?;
        if token.is_var() != want_var {
            let expected = if want_var { "a variable" } else { "a fixed word" };
            return Err(MinerError::InvalidEdit(format!(
                "position {} of template {} is not {}",
                position, tid, expected
            )));
        }
        Ok(())
    }

    fn record(&mut self, rec: EditRecord) -> Result<EditRecord> {
        self.edits.push(rec.clone());
        Ok(rec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::HeuristicConfig;
    use crate::crf::LabelWord;
    use crate::ltgen::{HeuristicGen, Outcome};

    fn manager_with(lines: &[&str]) -> LtManager {
        let gen = HeuristicGen::new(LabelWord::default(), &HeuristicConfig::default());
        let mut mgr = LtManager::new(Box::new(gen));
        for line in lines {
            let words: Vec<String> = line.split(' ').map(String::from).collect();
            mgr.process_line(&words, &[]).unwrap();
        }
        mgr
    }

    fn tpl(s: &str) -> Template {
        Template::from_words(&s.split(' ').collect::<Vec<_>>(), "*")
    }

    // ---- merge ----

    #[test]
    fn test_merge_generalizes_and_redirects() {
        let mut mgr = manager_with(&["disk sda full", "disk sdb full"]);
        let rec = mgr.merge(0, 1).unwrap();
        assert_eq!(rec, EditRecord::Merged { survivor: 0, retired: 1 });
        assert_eq!(mgr.get(0).unwrap(), &tpl("disk * full"));
        assert!(mgr.get(1).unwrap_err().is_not_found());
        assert_eq!(mgr.resolve(1).unwrap(), 0);
        assert_eq!(mgr.search(&["disk", "sdc", "full"]), Some(0));
        assert_eq!(mgr.tree().len(), 1);
    }

    #[test]
    fn test_merged_content_is_not_recreated_by_ingestion() {
        let mut mgr = manager_with(&["disk sda full", "disk sdb full"]);
        mgr.merge(0, 1).unwrap();
        let words: Vec<String> = "disk sdb full".split(' ').map(String::from).collect();
        assert_eq!(mgr.process_line(&words, &[]).unwrap(), Outcome::Unchanged(0));
        assert_eq!(mgr.table().len(), 1);
        assert_eq!(mgr.search(&words), Some(0));
    }

    #[test]
    fn test_merge_rejects_retired_id() {
        let mut mgr = manager_with(&["disk sda full", "disk sdb full", "disk sdc full"]);
        mgr.merge(0, 1).unwrap();
        let err = mgr.merge(2, 1).unwrap_err();
        assert!(matches!(err, MinerError::InvalidEdit(ref m) if m.contains("retired")));
    }

    #[test]
    fn test_merge_rejects_length_mismatch() {
        let mut mgr = manager_with(&["disk sda full", "disk sda is full"]);
        let err = mgr.merge(0, 1).unwrap_err();
        assert!(matches!(err, MinerError::InvalidEdit(_)));
        assert_eq!(mgr.table().len(), 2);
    }

    #[test]
    fn test_merge_rejects_third_owner() {
        let mut mgr = manager_with(&["disk sda full", "disk sdb full", "disk 7 full"]);
        assert_eq!(mgr.get(2).unwrap(), &tpl("disk * full"));
        let err = mgr.merge(0, 1).unwrap_err();
        assert!(matches!(err, MinerError::InvalidEdit(_)));
        assert_eq!(mgr.table().len(), 3);
        assert!(mgr.edits().is_empty());
    }

    #[test]
    fn test_merge_into_more_general_template() {
        let mut mgr = manager_with(&["disk sda full", "disk 7 full"]);
        mgr.merge(0, 1).unwrap();
        assert_eq!(mgr.get(0).unwrap(), &tpl("disk * full"));
        assert_eq!(mgr.table().len(), 1);
    }

    // ---- split / separate ----

    #[test]
    fn test_split_keeps_source_id_for_first_word() {
        let mut mgr = manager_with(&["disk 7 full"]);
        let rec = mgr.split(0, 1, &["sda", "sdb", "sda"]).unwrap();
        assert_eq!(rec, EditRecord::Split { source: 0, into: vec![0, 1] });
        assert_eq!(mgr.get(0).unwrap(), &tpl("disk sda full"));
        assert_eq!(mgr.get(1).unwrap(), &tpl("disk sdb full"));
        assert_eq!(mgr.search(&["disk", "sdb", "full"]), Some(1));
        assert_eq!(mgr.search(&["disk", "sdc", "full"]), None);
    }

    #[test]
    fn test_split_rejects_fixed_position_and_existing_variant() {
        let mut mgr = manager_with(&["disk 7 full", "disk sda full"]);
        assert!(matches!(mgr.split(0, 0, &["x"]), Err(MinerError::InvalidEdit(_))));
        assert!(matches!(mgr.split(0, 1, &["sda"]), Err(MinerError::InvalidEdit(_))));
        assert!(matches!(mgr.split(0, 9, &["x"]), Err(MinerError::InvalidEdit(_))));
        assert_eq!(mgr.get(0).unwrap(), &tpl("disk * full"));
    }

    #[test]
    fn test_separate_adds_specialization() {
        let mut mgr = manager_with(&["user 1 login from 10.0.0.1"]);
        let rec = mgr.separate(0, tpl("user root login from *")).unwrap();
        assert_eq!(rec, EditRecord::Separated { source: 0, new: 1 });
        assert_eq!(mgr.search(&["user", "root", "login", "from", "h"]), Some(1));
        assert_eq!(mgr.search(&["user", "bob", "login", "from", "h"]), Some(0));
        assert!(mgr.separate(0, tpl("user * logout from *")).is_err());
        assert!(mgr.separate(0, tpl("user * login from *")).is_err());
    }

    // ---- fix / free ----

    #[test]
    fn test_fix_and_free_replace_content() {
        let mut mgr = manager_with(&["job 7 done"]);
        assert_eq!(mgr.fix(0, &[(1, "seven")]).unwrap(), EditRecord::Replaced { tid: 0 });
        assert_eq!(mgr.get(0).unwrap(), &tpl("job seven done"));
        assert_eq!(mgr.free(0, &[1, 2]).unwrap(), EditRecord::Replaced { tid: 0 });
        assert_eq!(mgr.get(0).unwrap(), &tpl("job * *"));
        assert_eq!(mgr.search(&["job", "x", "y"]), Some(0));
    }

    #[test]
    fn test_free_collision_merges_into_owner() {
        let mut mgr = manager_with(&["disk 7 full", "disk sda full"]);
        let rec = mgr.free(1, &[1]).unwrap();
        assert_eq!(rec, EditRecord::Merged { survivor: 0, retired: 1 });
        assert_eq!(mgr.resolve(1).unwrap(), 0);
        assert_eq!(mgr.tree().len(), 1);
        assert_eq!(mgr.edits().len(), 1);
    }

    #[test]
    fn test_ids_are_never_reused_after_retire() {
        let mut mgr = manager_with(&["disk sda full", "disk sdb full"]);
        mgr.merge(0, 1).unwrap();
        let words: Vec<String> = "kernel panic".split(' ').map(String::from).collect();
        let outcome = mgr.process_line(&words, &[]).unwrap();
        assert_eq!(outcome.tid(), Some(2));
    }
}
