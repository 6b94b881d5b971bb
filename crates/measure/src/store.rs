//! Store — labeled lines held in memory and selected by rule.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use miner::crf::{LabeledCorpus, LabeledLine};
use tracing::{debug, info};

use crate::error::{MeasureError, Result};
use crate::filter::LineFilter;

/// Area that spans every host.
pub const AREA_ALL: &str = "all";

#[derive(Debug, Clone, Default)]
pub struct MemoryLineStore {
    lines: Vec<LabeledLine>,
    areas: HashMap<String, HashSet<String>>,
}

impl MemoryLineStore {
    pub fn new(lines: Vec<LabeledLine>) -> Self {
        Self {
            lines,
            areas: HashMap::new(),
        }
    }

    pub fn from_corpus(path: impl AsRef<Path>) -> Result<Self> {
        let corpus = LabeledCorpus::open(path)?;
        let lines = corpus.iter()?.collect::<miner::Result<Vec<_>>>()?;
        info!(lines = lines.len(), path = %corpus.path().display(), "loaded labeled corpus");
        Ok(Self::new(lines))
    }

    pub fn with_areas<I, S>(mut self, areas: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<S>)>,
        S: Into<String>,
    {
        for (area, hosts) in areas {
            self.areas
                .entry(area)
                .or_default()
                .extend(hosts.into_iter().map(Into::into));
        }
        self
    }

    /// Lines satisfying every predicate of `filter`, in stored order.
    pub fn select(&self, filter: &LineFilter) -> Result<Vec<LabeledLine>> {
        let area_hosts = match filter.area.as_deref() {
            None | Some(AREA_ALL) => None,
            Some(area) => Some(
                self.areas
                    .get(area)
                    .ok_or_else(|| MeasureError::InvalidRule(format!("unknown area {:?}", area)))?,
            ),
        };
        let selected: Vec<LabeledLine> = self
            .lines
            .iter()
            .filter(|line| filter.matches(line, area_hosts))
            .cloned()
            .collect();
        debug!(%filter, selected = selected.len(), "selected lines");
        Ok(selected)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
