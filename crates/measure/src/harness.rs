//! Harness — accuracy measurement of the CRF strategy on held-out lines.
//!
//! Each trial trains a fresh model on its own training lines, tags every test
//! line, and scores word, line, and template accuracy against the labels
//! stored with the test lines.

use std::fmt::Write as _;
use std::path::Path;

use miner::crf::items::iter_items_from_file;
use miner::crf::{Label, LabeledLine, LineItem};
use miner::ltgen::{CrfGen, Trainable};
use miner::{TemplateTable, Tid};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{MeasureConfig, SampleFrom, TrainSampleMethod};
use crate::error::{MeasureError, Result};
use crate::filter::LineFilter;
use crate::sampling::{divide_size, sample_train};
use crate::store::MemoryLineStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub word_acc: f64,
    pub line_acc: f64,
    pub tpl_acc: f64,
    pub train_size: usize,
    pub test_size: usize,
    pub train_tpl_size: usize,
    pub test_tpl_size: usize,
}

impl TrialResult {
    fn fields(&self) -> [(&'static str, String); 7] {
        [
            ("word_acc", self.word_acc.to_string()),
            ("line_acc", self.line_acc.to_string()),
            ("tpl_acc", self.tpl_acc.to_string()),
            ("train_size", self.train_size.to_string()),
            ("test_size", self.test_size.to_string()),
            ("train_tpl_size", self.train_tpl_size.to_string()),
            ("test_tpl_size", self.test_tpl_size.to_string()),
        ]
    }
}

/// Running numerators and denominators of the three accuracies.
#[derive(Debug, Clone, Default)]
pub struct AccuracyCounter {
    word_hit: f64,
    word_total: f64,
    line_hit: f64,
    line_total: f64,
    tpl_hit: f64,
    tpl_total: f64,
}

impl AccuracyCounter {
    /// Score one line. `tpl_count` is how often the line's ground-truth
    /// template occurs in the whole test set.
    pub fn add(&mut self, truth: &[Label], predicted: &[Label], tpl_count: usize) {
        for (t, p) in truth.iter().zip(predicted) {
            self.word_total += 1.0;
            if t == p {
                self.word_hit += 1.0;
            }
        }
        let weight = 1.0 / tpl_count as f64;
        self.line_total += 1.0;
        self.tpl_total += weight;
        if truth == predicted {
            self.line_hit += 1.0;
            self.tpl_hit += weight;
        }
    }

    pub fn word_acc(&self) -> f64 {
        ratio(self.word_hit, self.word_total)
    }

    pub fn line_acc(&self) -> f64 {
        ratio(self.line_hit, self.line_total)
    }

    pub fn tpl_acc(&self) -> f64 {
        ratio(self.tpl_hit, self.tpl_total)
    }
}

/// Nothing scored counts as zero accuracy.
fn ratio(hit: f64, total: f64) -> f64 {
    if total > 0.0 {
        hit / total
    } else {
        0.0
    }
}

/// Ground-truth template id of every line plus per-template occurrence counts.
///
/// Ids come from a fresh table, so they are local to the given lines.
pub fn count_templates(lines: &[LabeledLine]) -> Result<(Vec<Tid>, Vec<usize>)> {
    let mut table = TemplateTable::new();
    let mut counts: Vec<usize> = Vec::new();
    let mut tids = Vec::with_capacity(lines.len());
    for line in lines {
        let tid = table.add(line.template()?);
        if tid >= counts.len() {
            counts.resize(tid + 1, 0);
        }
        counts[tid] += 1;
        tids.push(tid);
    }
    Ok((tids, counts))
}

/// Tag every test line with `tag` and accumulate accuracies.
///
/// Lines without items carry no labels to score and are skipped.
pub fn score_lines<F>(test: &[LabeledLine], mut tag: F) -> Result<AccuracyCounter>
where
    F: FnMut(&[LineItem]) -> miner::Result<Vec<Label>>,
{
    let scored: Vec<LabeledLine> = test.iter().filter(|l| !l.items.is_empty()).cloned().collect();
    if scored.len() < test.len() {
        debug!(skipped = test.len() - scored.len(), "skipping test lines without items");
    }
    let (tids, counts) = count_templates(&scored)?;
    let mut counter = AccuracyCounter::default();
    for (line, tid) in scored.iter().zip(tids) {
        let predicted = tag(&line.items)?;
        counter.add(&line.labels(), &predicted, counts[tid]);
    }
    Ok(counter)
}

/// Mean and standard error over trials.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub mean: f64,
    /// Population standard deviation divided by sqrt(n).
    pub err: f64,
    pub n: usize,
}

impl Summary {
    pub fn of(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(MeasureError::EmptyResult);
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Ok(Self {
            mean,
            err: var.sqrt() / n.sqrt(),
            n: values.len(),
        })
    }
}

pub struct MeasureAccuracy {
    conf: MeasureConfig,
    test_rules: LineFilter,
    train_rules: LineFilter,
    rng: ChaCha8Rng,
    results: Vec<TrialResult>,
}

impl MeasureAccuracy {
    pub fn new(conf: MeasureConfig) -> Result<Self> {
        let test_rules = LineFilter::parse(&conf.sample_rules)?;
        let train_rules = LineFilter::parse(&conf.sample_train_rules)?;
        let rng = ChaCha8Rng::seed_from_u64(conf.seed);
        Ok(Self {
            conf,
            test_rules,
            train_rules,
            rng,
            results: Vec::new(),
        })
    }

    /// Load the configured corpus and run every trial.
    pub fn run(conf: MeasureConfig) -> Result<Self> {
        let store = MemoryLineStore::from_corpus(&conf.corpus_path)?
            .with_areas(conf.areas.clone());
        let mut measure = Self::new(conf)?;
        measure.measure(&store)?;
        Ok(measure)
    }

    pub fn measure(&mut self, store: &MemoryLineStore) -> Result<()> {
        match self.conf.sample_from {
            SampleFrom::Cross => self.eval_cross(store)?,
            SampleFrom::Diff => {
                let test = store.select(&self.test_rules)?;
                self.eval_diff(test, store)?;
            }
            SampleFrom::File => {
                let test = iter_items_from_file(&self.conf.sample_from_file)?
                    .collect::<miner::Result<Vec<_>>>()?;
                self.eval_diff(test, store)?;
            }
        }
        if self.results.is_empty() {
            return Err(MeasureError::EmptyResult);
        }
        Ok(())
    }

    fn eval_cross(&mut self, store: &MemoryLineStore) -> Result<()> {
        let mut lines = store.select(&self.test_rules)?;
        lines.shuffle(&mut self.rng);

        let mut groups: Vec<Vec<LabeledLine>> = Vec::with_capacity(self.conf.cross_k);
        let mut rest = lines.into_iter();
        for size in divide_size(rest.len(), self.conf.cross_k) {
            groups.push(rest.by_ref().take(size).collect());
        }

        // One group trains, every other group tests.
        for trial in 0..self.conf.train_trials.min(groups.len()) {
            let train = &groups[trial];
            let test: Vec<LabeledLine> = groups
                .iter()
                .enumerate()
                .filter(|(gid, _)| *gid != trial)
                .flat_map(|(_, g)| g.iter().cloned())
                .collect();
            let result = self.trial(trial, train, &test)?;
            self.results.push(result);
        }
        Ok(())
    }

    fn eval_diff(&mut self, test: Vec<LabeledLine>, store: &MemoryLineStore) -> Result<()> {
        let pool = store.select(&self.train_rules)?;
        match self.conf.train_sample_method {
            TrainSampleMethod::All => {
                let train = sample_train(&pool, self.conf.train_size, TrainSampleMethod::All, &mut self.rng)?;
                let result = self.trial(0, &train, &test)?;
                self.results.push(result);
            }
            TrainSampleMethod::Random => {
                for trial in 0..self.conf.train_trials {
                    let train = sample_train(&pool, self.conf.train_size, TrainSampleMethod::Random, &mut self.rng)?;
                    let result = self.trial(trial, &train, &test)?;
                    self.results.push(result);
                }
            }
        }
        Ok(())
    }

    fn trial(&self, trial: usize, train: &[LabeledLine], test: &[LabeledLine]) -> Result<TrialResult> {
        if test.is_empty() {
            warn!(trial, "no test lines selected");
            return Err(MeasureError::EmptyResult);
        }
        let model = self.conf.trial_model_path(trial);
        let mut gen = CrfGen::with_model(&self.conf.miner.crf, &model)?;
        gen.train(train.iter().map(|l| l.items.as_slice()))?;

        let counter = score_lines(test, |items| gen.label_line(items))?;
        gen.close_tagger();

        let result = TrialResult {
            word_acc: counter.word_acc(),
            line_acc: counter.line_acc(),
            tpl_acc: counter.tpl_acc(),
            train_size: train.len(),
            test_size: test.len(),
            train_tpl_size: count_templates(train)?.1.len(),
            test_tpl_size: count_templates(test)?.1.len(),
        };
        info!(
            trial,
            word_acc = result.word_acc,
            line_acc = result.line_acc,
            tpl_acc = result.tpl_acc,
            model = %model.display(),
            "trial finished"
        );
        Ok(result)
    }

    pub fn results(&self) -> &[TrialResult] {
        &self.results
    }

    pub fn conf(&self) -> &MeasureConfig {
        &self.conf
    }

    /// Summaries of word, line, and template accuracy in that order.
    pub fn summary(&self) -> Result<[Summary; 3]> {
        let collect = |f: fn(&TrialResult) -> f64| self.results.iter().map(f).collect::<Vec<_>>();
        Ok([
            Summary::of(&collect(|r| r.word_acc))?,
            Summary::of(&collect(|r| r.line_acc))?,
            Summary::of(&collect(|r| r.tpl_acc))?,
        ])
    }

    pub fn info(&self) -> String {
        let mut buf = String::from("# Experiment for measuring log template generation accuracy\n");
        match self.conf.sample_from {
            SampleFrom::Cross => {
                let _ = writeln!(buf, "# type: Cross-validation (k = {})", self.conf.cross_k);
                let _ = writeln!(buf, "# source: rules({})", self.test_rules);
            }
            SampleFrom::Diff | SampleFrom::File => {
                buf.push_str("# type: Experiment with different data range / domain\n");
                let _ = writeln!(buf, "# train-source: rules({})", self.train_rules);
                if self.conf.sample_from == SampleFrom::File {
                    let _ = writeln!(buf, "# test-source: file({})", Path::new(&self.conf.sample_from_file).display());
                } else {
                    let _ = writeln!(buf, "# test-source: rules({})", self.test_rules);
                }
            }
        }
        let _ = write!(buf, "# trials: {}", self.conf.train_trials);
        buf
    }

    pub fn result(&self) -> Result<String> {
        let [wa, la, ta] = self.summary()?;
        let mut buf = String::new();
        for (rid, result) in self.results.iter().enumerate() {
            let _ = writeln!(buf, "Experiment {}", rid);
            for (key, val) in result.fields() {
                let _ = writeln!(buf, "{} {}", key, val);
            }
            buf.push('\n');
        }
        buf.push_str("# General result\n");
        let _ = writeln!(buf, "Average word accuracy: {} (err: {})", wa.mean, wa.err);
        let _ = writeln!(buf, "Average line accuracy: {} (err: {})", la.mean, la.err);
        let _ = write!(buf, "Average template accuracy: {} (err: {})", ta.mean, ta.err);
        Ok(buf)
    }
}
