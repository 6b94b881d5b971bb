//! Ltgen module — template generation strategies.
//!
//! - `traits.rs`: strategy contract, per-line outcome, training lifecycle
//! - `import.rs`: definition catalog matching
//! - `crf.rs`: sequence labeling with a trained model
//! - `heuristic.rs`: word-class baseline
//! - `split.rs`: tokenizer contract

pub mod traits;
pub mod split;
pub mod import;
pub mod crf;
pub mod heuristic;

use serde::{Deserialize, Serialize};

use crate::conf::MinerConfig;
use crate::crf::LabelWord;
use crate::error::Result;

pub use traits::{commit, Outcome, TemplateGenerator, Trainable, Transition};
pub use split::{Tokenizer, WordSplitter};
pub use import::ImportGen;
pub use crf::CrfGen;
pub use heuristic::HeuristicGen;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenMethod {
    Import,
    Crf,
    Heuristic,
}

impl std::str::FromStr for GenMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "import" => Ok(GenMethod::Import),
            "crf" => Ok(GenMethod::Crf),
            "heuristic" => Ok(GenMethod::Heuristic),
            other => Err(format!("unknown template generation method {:?}", other)),
        }
    }
}

/// Build the configured strategy. A CRF strategy must find its model here.
pub fn init_ltgen(
    conf: &MinerConfig,
    method: GenMethod,
    tokenizer: &dyn Tokenizer,
) -> Result<Box<dyn TemplateGenerator>> {
    let gen: Box<dyn TemplateGenerator> = match method {
        GenMethod::Import => Box::new(ImportGen::from_config(conf, tokenizer)?),
        GenMethod::Crf => Box::new(CrfGen::for_tagging(&conf.crf)?),
        GenMethod::Heuristic => Box::new(HeuristicGen::new(
            LabelWord::new(conf.crf.known_hosts.iter().cloned()),
            &conf.heuristic,
        )),
    };
    tracing::info!(method = gen.name(), "template generator ready");
    Ok(gen)
}
