//! Sampling — train-set selection, group partitioning, and model building.

use std::path::{Path, PathBuf};

use miner::conf::CrfConfig;
use miner::crf::LabeledLine;
use miner::ltgen::{CrfGen, Trainable};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{info, warn};

use crate::config::TrainSampleMethod;
use crate::error::{MeasureError, Result};

/// Split `size` items into `groups` counts that differ by at most one; the
/// remainder goes to the earliest groups.
pub fn divide_size(size: usize, groups: usize) -> Vec<usize> {
    if groups == 0 {
        return Vec::new();
    }
    let base = size / groups;
    let surplus = size % groups;
    let sizes: Vec<usize> = (0..groups).map(|i| base + usize::from(i < surplus)).collect();
    debug_assert_eq!(sizes.iter().sum::<usize>(), size);
    sizes
}

/// Pick training lines from `pool`.
///
/// `All` returns the whole pool and ignores `size`; `Random` draws `size`
/// distinct lines and fails if the pool is smaller.
pub fn sample_train<R: Rng + ?Sized>(
    pool: &[LabeledLine],
    size: usize,
    method: TrainSampleMethod,
    rng: &mut R,
) -> Result<Vec<LabeledLine>> {
    match method {
        TrainSampleMethod::All => {
            if size > 1 {
                warn!(size, "train_size is ignored when sampling all lines");
            }
            Ok(pool.to_vec())
        }
        TrainSampleMethod::Random => {
            if size > pool.len() {
                return Err(MeasureError::SampleTooLarge {
                    requested: size,
                    available: pool.len(),
                });
            }
            Ok(pool.choose_multiple(rng, size).cloned().collect())
        }
    }
}

/// Sample a training set and fit a model at `model`.
pub fn build_model<R: Rng + ?Sized>(
    conf: &CrfConfig,
    model: impl AsRef<Path>,
    pool: &[LabeledLine],
    size: usize,
    method: TrainSampleMethod,
    rng: &mut R,
) -> Result<PathBuf> {
    let train = sample_train(pool, size, method, rng)?;
    let mut gen = CrfGen::with_model(conf, model.as_ref())?;
    let path = gen.train(train.iter().map(|l| l.items.as_slice()))?;
    info!(lines = train.len(), model = %path.display(), "built crf model");
    Ok(path)
}
