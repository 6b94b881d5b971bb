use anyhow::{bail, Context, Result};
use miner::conf::MinerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::filter::LineFilter;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MeasureConfig {
    /// Labeled corpus that stands in for the log database.
    pub corpus_path: String,
    pub sample_from: SampleFrom,
    /// Selection rules for test lines (train lines too, for cross validation)
    pub sample_rules: String,
    pub sample_train_rules: String,
    pub train_sample_method: TrainSampleMethod,
    pub train_size: usize,
    pub train_trials: usize,
    pub cross_k: usize,
    /// Pre-labeled test corpus for `sample_from = "file"`
    pub sample_from_file: String,
    pub seed: u64,
    /// Directory receiving per-trial models
    pub model_dir: String,
    /// Upper bound on concurrently running measurements
    pub parallelism: usize,
    /// Area name to member hosts, for the `area=` rule
    pub areas: HashMap<String, Vec<String>>,
    pub logging: LoggingConfig,
    pub miner: MinerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFrom {
    Cross,
    Diff,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainSampleMethod {
    All,
    Random,
}

impl std::str::FromStr for TrainSampleMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "all" => Ok(TrainSampleMethod::All),
            "random" => Ok(TrainSampleMethod::Random),
            other => Err(format!("unknown train sample method: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl MeasureConfig {
    /// Load configuration from measure.toml and environment variables
    pub fn load() -> Result<Self> {
        Self::build(None)
    }

    /// Same layering as `load`, with an explicit (required) config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::build(Some(path.as_ref()))
    }

    fn build(file: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = config::Config::try_from(&MeasureConfig::default())
            .context("Failed to serialize default configuration")?;

        let mut builder = config::Config::builder().add_source(defaults);

        match file {
            Some(path) => {
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                for path in ["measure", "config/measure"] {
                    builder = builder.add_source(config::File::with_name(path).required(false));
                }
            }
        }

        // Nested keys use a double underscore: MEASURE_MINER__CRF__EPOCHS
        builder = builder.add_source(
            config::Environment::with_prefix("MEASURE")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.parallelism == 0 {
            bail!("parallelism must be > 0");
        }
        if self.train_trials == 0 {
            bail!("train_trials must be > 0");
        }
        match self.sample_from {
            SampleFrom::Cross => {
                if self.cross_k < 2 {
                    bail!("cross_k must be at least 2");
                }
                if self.train_trials > self.cross_k {
                    bail!(
                        "train_trials ({}) is larger than cross_k ({})",
                        self.train_trials,
                        self.cross_k
                    );
                }
            }
            SampleFrom::Diff | SampleFrom::File => {
                if self.train_sample_method == TrainSampleMethod::Random && self.train_size == 0 {
                    bail!("train_size must be > 0 for random train sampling");
                }
                LineFilter::parse(&self.sample_train_rules).context("Invalid sample_train_rules")?;
            }
        }
        if self.sample_from == SampleFrom::File && self.sample_from_file.is_empty() {
            bail!("sample_from_file is required when sample_from = \"file\"");
        }
        // File mode still trains on lines from the corpus.
        if self.corpus_path.is_empty() {
            bail!("corpus_path must not be empty");
        }
        LineFilter::parse(&self.sample_rules).context("Invalid sample_rules")?;
        self.miner.validate().map_err(anyhow::Error::msg)?;
        Ok(())
    }

    /// Model file for one trial of this measurement.
    pub fn trial_model_path(&self, trial: usize) -> PathBuf {
        let base = Path::new(&self.miner.crf.model_filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "crf_model".to_string());
        Path::new(&self.model_dir).join(format!("{}.{}", base, trial))
    }
}

impl Default for MeasureConfig {
    fn default() -> Self {
        Self {
            corpus_path: "corpus.jsonl".to_string(),
            sample_from: SampleFrom::Cross,
            sample_rules: String::new(),
            sample_train_rules: String::new(),
            train_sample_method: TrainSampleMethod::Random,
            train_size: 1000,
            train_trials: 10,
            cross_k: 10,
            sample_from_file: String::new(),
            seed: 0,
            model_dir: "models".to_string(),
            parallelism: 4,
            areas: HashMap::new(),
            logging: LoggingConfig::default(),
            miner: MinerConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "measure=info,miner=info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_conf(name: &str, body: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("measure-conf-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("measure.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_default_config_is_valid() {
        MeasureConfig::default().validate().unwrap();
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = write_conf(
            "override",
            r#"
sample_from = "diff"
sample_rules = "top_date=2020-01-02"
sample_train_rules = "end_date=2020-01-01"
train_sample_method = "all"

[miner.crf]
epochs = 3
"#,
        );
        let conf = MeasureConfig::from_file(&path).unwrap();
        assert_eq!(conf.sample_from, SampleFrom::Diff);
        assert_eq!(conf.train_sample_method, TrainSampleMethod::All);
        assert_eq!(conf.miner.crf.epochs, 3);
        assert_eq!(conf.cross_k, 10);
        assert_eq!(conf.miner.variable_symbol, "**");
        conf.validate().unwrap();
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        assert!(MeasureConfig::from_file("/nonexistent/measure.toml").is_err());
    }

    #[test]
    fn test_validate_rejects_more_trials_than_groups() {
        let conf = MeasureConfig {
            cross_k: 3,
            train_trials: 4,
            ..MeasureConfig::default()
        };
        let err = conf.validate().unwrap_err();
        assert!(err.to_string().contains("larger than cross_k"));
    }

    #[test]
    fn test_validate_rejects_bad_rules() {
        let conf = MeasureConfig {
            sample_rules: "colour=red".to_string(),
            ..MeasureConfig::default()
        };
        assert!(conf.validate().is_err());
    }

    #[test]
    fn test_validate_requires_corpus_for_every_mode() {
        let conf = MeasureConfig {
            corpus_path: String::new(),
            sample_from: SampleFrom::File,
            sample_from_file: "test.jsonl".to_string(),
            ..MeasureConfig::default()
        };
        let err = conf.validate().unwrap_err();
        assert!(err.to_string().contains("corpus_path"));
    }

    #[test]
    fn test_trial_model_path() {
        let mut conf = MeasureConfig::default();
        conf.model_dir = "/tmp/m".to_string();
        conf.miner.crf.model_filename = "out/crf_a".to_string();
        assert_eq!(conf.trial_model_path(2), PathBuf::from("/tmp/m/crf_a.2"));
    }
}
