//! Error taxonomy for accuracy measurement.

use miner::MinerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeasureError {
    #[error("No measure results found")]
    EmptyResult,
    #[error("Invalid rule: {0}")]
    InvalidRule(String),
    #[error("Sample size {requested} exceeds the {available} available lines")]
    SampleTooLarge { requested: usize, available: usize },
    #[error("{missing} of {expected} task results were never retrieved")]
    MissingResults { expected: usize, missing: usize },
    #[error("Miner error: {0}")]
    Miner(#[from] MinerError),
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MeasureError>;
