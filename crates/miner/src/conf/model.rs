//! Model — MinerConfig and related structs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Reserved token that marks a variable position in templates.
    pub variable_symbol: String,
    pub import: ImportConfig,
    pub crf: CrfConfig,
    pub heuristic: HeuristicConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub def_path: String,
    pub mode: ImportMode,
}

/// Layout of a definition catalog line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// The whole line is the definition message.
    Plain,
    /// `<id> <message>`; the leading id is discarded.
    Ids,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrfConfig {
    pub model_filename: String,
    /// Feature specs such as `word[-1]`, `shape[0]`, `class[1]`.
    pub feature_template: Vec<String>,
    /// Derive word classes (IP address, host, digit, date, time) as features.
    pub middle_label: bool,
    /// Host names recognised as the `HOST` word class.
    pub known_hosts: Vec<String>,
    pub epochs: usize,
    pub verbose: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    /// Words whose share of digit characters reaches this ratio are variables.
    pub digit_ratio: f64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            variable_symbol: "**".to_string(),
            import: ImportConfig::default(),
            crf: CrfConfig::default(),
            heuristic: HeuristicConfig::default(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            def_path: "".to_string(),
            mode: ImportMode::Plain,
        }
    }
}

impl Default for CrfConfig {
    fn default() -> Self {
        Self {
            model_filename: "crf_model".to_string(),
            feature_template: [
                "word[-2]", "word[-1]", "word[0]", "word[1]", "word[2]",
                "shape[-1]", "shape[0]", "shape[1]",
                "class[-1]", "class[0]", "class[1]",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            middle_label: true,
            known_hosts: Vec::new(),
            epochs: 10,
            verbose: false,
        }
    }
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self { digit_ratio: 0.5 }
    }
}

impl MinerConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.variable_symbol.is_empty() {
            return Err("variable_symbol must not be empty".to_string());
        }
        if self.variable_symbol.chars().any(char::is_whitespace) {
            return Err("variable_symbol must not contain whitespace".to_string());
        }
        self.crf.validate()?;
        self.heuristic.validate()?;
        Ok(())
    }
}

impl CrfConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.model_filename.is_empty() {
            return Err("crf.model_filename must not be empty".to_string());
        }
        if self.epochs == 0 {
            return Err("crf.epochs must be > 0".to_string());
        }
        if self.feature_template.is_empty() {
            return Err("crf.feature_template must list at least one feature".to_string());
        }
        Ok(())
    }
}

impl HeuristicConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.digit_ratio > 0.0 && self.digit_ratio <= 1.0) {
            return Err("heuristic.digit_ratio must be in (0, 1]".to_string());
        }
        Ok(())
    }
}
