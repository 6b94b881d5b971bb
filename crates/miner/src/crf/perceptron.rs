//! Averaged structured perceptron with first-order label transitions.
//!
//! Decoding is Viterbi over the label lattice. The model is stored as JSON at
//! the path given to `train`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::backend::{BackendError, FeatureSeq, SequenceBackend};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PerceptronModel {
    labels: Vec<String>,
    weights: BTreeMap<String, Vec<f64>>,
    /// `labels.len() + 1` rows; the last row scores the first label of a line.
    transitions: Vec<Vec<f64>>,
}

impl PerceptronModel {
    fn start_row(&self) -> usize {
        self.labels.len()
    }

    fn decode(&self, xseq: &FeatureSeq) -> Vec<usize> {
        decode_with(self.labels.len(), &self.weights, &self.transitions, xseq)
    }

    fn validate(&self) -> Result<(), String> {
        let n = self.labels.len();
        if n == 0 {
            return Err("no labels".to_string());
        }
        if self.transitions.len() != n + 1 || self.transitions.iter().any(|r| r.len() != n) {
            return Err("transition matrix has wrong shape".to_string());
        }
        if self.weights.values().any(|w| w.len() != n) {
            return Err("weight vector has wrong length".to_string());
        }
        Ok(())
    }
}

fn emission(weights: &BTreeMap<String, Vec<f64>>, features: &[String], label: usize) -> f64 {
    features
        .iter()
        .filter_map(|f| weights.get(f))
        .map(|w| w[label])
        .sum()
}

fn decode_with(
    n: usize,
    weights: &BTreeMap<String, Vec<f64>>,
    trans: &[Vec<f64>],
    xseq: &FeatureSeq,
) -> Vec<usize> {
    viterbi(n, xseq.len(), |t, y| emission(weights, &xseq[t], y), trans)
}

/// Best label path under emission and transition scores. Ties go to the
/// lower label index.
fn viterbi(n: usize, len: usize, emit: impl Fn(usize, usize) -> f64, trans: &[Vec<f64>]) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let mut score: Vec<f64> = (0..n).map(|y| trans[n][y] + emit(0, y)).collect();
    let mut back: Vec<Vec<usize>> = Vec::with_capacity(len);
    back.push(vec![0; n]);
    for t in 1..len {
        let mut next = vec![f64::NEG_INFINITY; n];
        let mut ptr = vec![0; n];
        for y in 0..n {
            let e = emit(t, y);
            for prev in 0..n {
                let s = score[prev] + trans[prev][y] + e;
                if s > next[y] {
                    next[y] = s;
                    ptr[y] = prev;
                }
            }
        }
        score = next;
        back.push(ptr);
    }
    let mut best = 0;
    for y in 1..n {
        if score[y] > score[best] {
            best = y;
        }
    }
    let mut path = vec![best; len];
    for t in (1..len).rev() {
        path[t - 1] = back[t][path[t]];
    }
    path
}

/// Weight store with the running-sum trick for averaging.
struct Averager {
    n: usize,
    weights: BTreeMap<String, Vec<f64>>,
    sums: BTreeMap<String, Vec<f64>>,
    transitions: Vec<Vec<f64>>,
    trans_sums: Vec<Vec<f64>>,
    step: f64,
}

impl Averager {
    fn new(n: usize) -> Self {
        Self {
            n,
            weights: BTreeMap::new(),
            sums: BTreeMap::new(),
            transitions: vec![vec![0.0; n]; n + 1],
            trans_sums: vec![vec![0.0; n]; n + 1],
            step: 1.0,
        }
    }

    fn bump_feature(&mut self, feature: &str, label: usize, delta: f64) {
        let n = self.n;
        self.weights.entry(feature.to_string()).or_insert_with(|| vec![0.0; n])[label] += delta;
        self.sums.entry(feature.to_string()).or_insert_with(|| vec![0.0; n])[label] += self.step * delta;
    }

    fn bump_transition(&mut self, prev: usize, label: usize, delta: f64) {
        self.transitions[prev][label] += delta;
        self.trans_sums[prev][label] += self.step * delta;
    }

    /// Decode against the live (non-averaged) weights.
    fn decode(&self, xseq: &FeatureSeq) -> Vec<usize> {
        decode_with(self.n, &self.weights, &self.transitions, xseq)
    }

    fn averaged(self, labels: Vec<String>) -> PerceptronModel {
        let step = self.step;
        let weights = self
            .weights
            .into_iter()
            .map(|(f, w)| {
                let sums = &self.sums[&f];
                let avg = w.iter().zip(sums).map(|(w, s)| w - s / step).collect();
                (f, avg)
            })
            .collect();
        let transitions = self
            .transitions
            .iter()
            .zip(&self.trans_sums)
            .map(|(row, sums)| row.iter().zip(sums).map(|(w, s)| w - s / step).collect())
            .collect();
        PerceptronModel { labels, weights, transitions }
    }
}

pub struct PerceptronBackend {
    epochs: usize,
    verbose: bool,
    model: Option<PerceptronModel>,
}

impl PerceptronBackend {
    pub fn new(epochs: usize, verbose: bool) -> Self {
        Self {
            epochs: epochs.max(1),
            verbose,
            model: None,
        }
    }

    fn fit(&self, xseqs: &[FeatureSeq], yseqs: &[Vec<String>]) -> Result<PerceptronModel, BackendError> {
        if xseqs.is_empty() {
            return Err(BackendError::EmptyTrainingSet);
        }
        if xseqs.len() != yseqs.len() {
            return Err(BackendError::ShapeMismatch {
                features: xseqs.len(),
                labels: yseqs.len(),
            });
        }
        for (x, y) in xseqs.iter().zip(yseqs) {
            if x.len() != y.len() {
                return Err(BackendError::ShapeMismatch {
                    features: x.len(),
                    labels: y.len(),
                });
            }
        }

        let labels: Vec<String> = yseqs
            .iter()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if labels.is_empty() {
            return Err(BackendError::EmptyTrainingSet);
        }
        let index = |l: &String| labels.binary_search(l).unwrap_or(0);
        let n = labels.len();
        let start = n;
        let mut avg = Averager::new(n);

        for epoch in 0..self.epochs {
            let mut mistakes = 0usize;
            for (x, y) in xseqs.iter().zip(yseqs) {
                let gold: Vec<usize> = y.iter().map(index).collect();
                let pred = avg.decode(x);
                if pred != gold {
                    mistakes += 1;
                    for t in 0..x.len() {
                        let (g, p) = (gold[t], pred[t]);
                        let (gp, pp) = if t == 0 {
                            (start, start)
                        } else {
                            (gold[t - 1], pred[t - 1])
                        };
                        if g != p {
                            for f in &x[t] {
                                avg.bump_feature(f, g, 1.0);
                                avg.bump_feature(f, p, -1.0);
                            }
                        }
                        if g != p || gp != pp {
                            avg.bump_transition(gp, g, 1.0);
                            avg.bump_transition(pp, p, -1.0);
                        }
                    }
                }
                avg.step += 1.0;
            }
            if self.verbose {
                tracing::info!(epoch, mistakes, lines = xseqs.len(), "perceptron epoch");
            } else {
                tracing::trace!(epoch, mistakes, "perceptron epoch");
            }
            if mistakes == 0 {
                break;
            }
        }
        Ok(avg.averaged(labels))
    }
}

impl SequenceBackend for PerceptronBackend {
    fn train(
        &mut self,
        xseqs: &[FeatureSeq],
        yseqs: &[Vec<String>],
        model_path: &Path,
    ) -> Result<PathBuf, BackendError> {
        let model = self.fit(xseqs, yseqs)?;
        if let Some(parent) = model_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let writer = BufWriter::new(File::create(model_path)?);
        serde_json::to_writer(writer, &model).map_err(|e| BackendError::Corrupt {
            path: model_path.to_path_buf(),
            reason: e.to_string(),
        })?;
        tracing::debug!(
            path = %model_path.display(),
            features = model.weights.len(),
            "perceptron model written"
        );
        Ok(model_path.to_path_buf())
    }

    fn open(&mut self, model_path: &Path) -> Result<(), BackendError> {
        let reader = BufReader::new(File::open(model_path)?);
        let corrupt = |reason: String| BackendError::Corrupt {
            path: model_path.to_path_buf(),
            reason,
        };
        let model: PerceptronModel = serde_json::from_reader(reader).map_err(|e| corrupt(e.to_string()))?;
        model.validate().map_err(corrupt)?;
        self.model = Some(model);
        Ok(())
    }

    fn close(&mut self) {
        self.model = None;
    }

    fn is_open(&self) -> bool {
        self.model.is_some()
    }

    fn tag(&self, xseq: &FeatureSeq) -> Result<Vec<String>, BackendError> {
        let model = self.model.as_ref().ok_or(BackendError::ModelNotLoaded)?;
        Ok(model
            .decode(xseq)
            .into_iter()
            .map(|y| model.labels[y].clone())
            .collect())
    }
}
