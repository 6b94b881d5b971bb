//! Table — deduplicated template store with stable, dense ids.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::conf::ImportMode;
use crate::error::{MinerError, Result};
use super::model::{Template, Tid};

/// Bijective `Tid <-> Template` store.
///
/// Ids are handed out densely from 0 in first-seen order and are never
/// reused. A retired id keeps its slot (as `None`) and a redirect to the id
/// that absorbed it, so later `add` calls cannot hand it out again.
#[derive(Debug, Clone, Default)]
pub struct TemplateTable {
    records: Vec<Option<Template>>,
    index: HashMap<Template, Tid>,
    redirects: HashMap<Tid, Tid>,
    live: usize,
}

impl TemplateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, tpl: &Template) -> bool {
        self.index.contains_key(tpl)
    }

    /// Return the id of `tpl`, assigning the next sequential id if unseen.
    pub fn add(&mut self, tpl: Template) -> Tid {
        if let Some(&tid) = self.index.get(&tpl) {
            return tid;
        }
        let tid = self.records.len();
        let previous = self.index.insert(tpl.clone(), tid);
        assert!(previous.is_none(), "template table: content indexed twice");
        self.records.push(Some(tpl));
        self.live += 1;
        self.check_bijection();
        tid
    }

    /// Like `add` but reports whether a new id was consumed.
    pub fn add_tracked(&mut self, tpl: Template) -> (Tid, bool) {
        let before = self.records.len();
        let tid = self.add(tpl);
        (tid, self.records.len() > before)
    }

    pub fn get_tid(&self, tpl: &Template) -> Result<Tid> {
        self.index
            .get(tpl)
            .copied()
            .ok_or_else(|| MinerError::NotFound(format!("template of length {}", tpl.len())))
    }

    pub fn get(&self, tid: Tid) -> Result<&Template> {
        self.records
            .get(tid)
            .and_then(|r| r.as_ref())
            .ok_or_else(|| MinerError::NotFound(format!("template id {}", tid)))
    }

    /// Follow redirects left by merges until a live id is reached.
    pub fn resolve(&self, tid: Tid) -> Result<Tid> {
        let mut current = tid;
        // Redirect chains are acyclic: a target is always live when recorded.
        for _ in 0..=self.redirects.len() {
            if matches!(self.records.get(current), Some(Some(_))) {
                return Ok(current);
            }
            match self.redirects.get(&current) {
                Some(&next) => current = next,
                None => break,
            }
        }
        Err(MinerError::NotFound(format!("template id {}", tid)))
    }

    pub fn is_retired(&self, tid: Tid) -> bool {
        self.redirects.contains_key(&tid)
    }

    /// Number of live templates.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The id the next new template will receive.
    pub fn next_tid(&self) -> Tid {
        self.records.len()
    }

    /// Live records in id order.
    pub fn iter(&self) -> impl Iterator<Item = (Tid, &Template)> {
        self.records
            .iter()
            .enumerate()
            .filter_map(|(tid, r)| r.as_ref().map(|tpl| (tid, tpl)))
    }

    /// Swap the content of a live id. Fails if `tpl` already belongs to another id.
    pub(crate) fn replace(&mut self, tid: Tid, tpl: Template) -> Result<Template> {
        if let Some(&owner) = self.index.get(&tpl) {
            if owner != tid {
                return Err(MinerError::InvalidEdit(format!(
                    "content already owned by template {}",
                    owner
                )));
            }
        }
        let slot = self
            .records
            .get_mut(tid)
            .and_then(|r| r.as_mut())
            .ok_or_else(|| MinerError::NotFound(format!("template id {}", tid)))?;
        let old = std::mem::replace(slot, tpl.clone());
        let removed = self.index.remove(&old);
        assert_eq!(removed, Some(tid), "template table: replaced content was not indexed");
        self.index.insert(tpl, tid);
        self.check_bijection();
        Ok(old)
    }

    /// Remove a live id's content and redirect it to `survivor`.
    pub(crate) fn retire(&mut self, tid: Tid, survivor: Tid) -> Result<Template> {
        if tid == survivor {
            return Err(MinerError::InvalidEdit(format!("cannot retire {} into itself", tid)));
        }
        self.get(survivor)?;
        let old = self
            .records
            .get_mut(tid)
            .and_then(|r| r.take())
            .ok_or_else(|| MinerError::NotFound(format!("template id {}", tid)))?;
        let removed = self.index.remove(&old);
        assert_eq!(removed, Some(tid), "template table: retired content was not indexed");
        self.redirects.insert(tid, survivor);
        self.live -= 1;
        self.check_bijection();
        Ok(old)
    }

    /// Render live templates in a form the definition importer reads back.
    pub fn export_definitions(&self, sym: &str, mode: ImportMode) -> String {
        let mut out = String::new();
        for (tid, tpl) in self.iter() {
            match mode {
                ImportMode::Plain => {
                    let _ = writeln!(out, "{}", tpl.display(sym));
                }
                ImportMode::Ids => {
                    let _ = writeln!(out, "{} {}", tid, tpl.display(sym));
                }
            }
        }
        out
    }

    /// Constant time: `live` tracks occupied slots, and each mutation asserts
    /// its own slot against the index.
    fn check_bijection(&self) {
        assert_eq!(
            self.live,
            self.index.len(),
            "template table bijection violated: {} live ids, {} indexed templates",
            self.live,
            self.index.len()
        );
    }
}
