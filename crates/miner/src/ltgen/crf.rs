//! CRF — template generation by sequence labeling.
//!
//! Each word is tagged `D` (description, kept verbatim) or `V` (variable,
//! replaced by the placeholder). Training and tagging share one instance but
//! never overlap: training closes any open tagger first.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::conf::CrfConfig;
use crate::crf::items::{self, labels_to_template, line_to_items, Label, LineItem};
use crate::crf::{FeatureExtractor, LabelWord, PerceptronBackend, SequenceBackend};
use crate::error::{MinerError, Result};
use crate::template::Template;
use super::traits::{TemplateGenerator, Trainable};

pub struct CrfGen {
    model: PathBuf,
    extractor: FeatureExtractor,
    backend: Box<dyn SequenceBackend>,
}

impl CrfGen {
    pub fn new(model: impl Into<PathBuf>, extractor: FeatureExtractor, backend: Box<dyn SequenceBackend>) -> Self {
        Self {
            model: model.into(),
            extractor,
            backend,
        }
    }

    /// Strategy with the built-in perceptron backend; model path from config.
    pub fn from_config(conf: &CrfConfig) -> Result<Self> {
        Self::with_model(conf, &conf.model_filename)
    }

    /// Same as `from_config` with an explicit model path.
    pub fn with_model(conf: &CrfConfig, model: impl Into<PathBuf>) -> Result<Self> {
        let label_word = conf
            .middle_label
            .then(|| LabelWord::new(conf.known_hosts.iter().cloned()));
        let extractor = FeatureExtractor::new(&conf.feature_template, label_word)?;
        let backend = Box::new(PerceptronBackend::new(conf.epochs, conf.verbose));
        Ok(Self::new(model, extractor, backend))
    }

    /// Strategy ready for tagging; fails before any line if no model exists.
    pub fn for_tagging(conf: &CrfConfig) -> Result<Self> {
        let mut gen = Self::from_config(conf)?;
        gen.init_tagger()?;
        Ok(gen)
    }

    pub fn model_path(&self) -> &Path {
        &self.model
    }

    pub fn train_from_file(&mut self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let lines = items::iter_items_from_file(path)?.collect::<Result<Vec<_>>>()?;
        self.train(lines.iter().map(|l| l.items.as_slice()))
    }

    /// Tag a line, opening the model on first use.
    pub fn label_line(&mut self, line: &[LineItem]) -> Result<Vec<Label>> {
        if !self.backend.is_open() {
            self.init_tagger()?;
        }
        let xseq = self.extractor.feature(line);
        let raw = self.backend.tag(&xseq)?;
        if raw.len() != line.len() {
            return Err(MinerError::Labeling(format!(
                "tagger returned {} labels for {} words",
                raw.len(),
                line.len()
            )));
        }
        FeatureExtractor::parse_labels(&raw)
    }
}

impl Trainable for CrfGen {
    fn train<'a, I>(&mut self, lines: I) -> Result<PathBuf>
    where
        I: IntoIterator<Item = &'a [LineItem]>,
    {
        self.close_tagger();
        let mut xseqs = Vec::new();
        let mut yseqs = Vec::new();
        for line in lines {
            if let Some(item) = line.iter().find(|i| i.label == Label::Dummy) {
                return Err(MinerError::Labeling(format!(
                    "training word {:?} has no label",
                    item.word
                )));
            }
            xseqs.push(self.extractor.feature(line));
            yseqs.push(self.extractor.label(line));
        }
        info!(lines = xseqs.len(), model = %self.model.display(), "training crf model");
        Ok(self.backend.train(&xseqs, &yseqs, &self.model)?)
    }

    fn init_tagger(&mut self) -> Result<()> {
        if !self.model.exists() {
            return Err(MinerError::ModelNotFound(self.model.clone()));
        }
        self.backend.open(&self.model)?;
        Ok(())
    }

    fn close_tagger(&mut self) {
        if self.backend.is_open() {
            self.backend.close();
        }
    }
}

impl TemplateGenerator for CrfGen {
    fn name(&self) -> &'static str {
        "crf"
    }

    fn generate(&mut self, words: &[String], seps: &[String]) -> Result<Option<Template>> {
        let line = line_to_items(words, seps);
        let labels = self.label_line(&line)?;
        labels_to_template(words, &labels).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crf::{BackendError, FeatureSeq};
    use crate::ltgen::traits::Outcome;
    use crate::template::TemplateTable;

    fn labeled(pairs: &[(&str, Label)]) -> Vec<LineItem> {
        pairs.iter()
            .map(|(w, l)| LineItem { word: w.to_string(), sep: " ".to_string(), label: *l })
            .collect()
    }

    fn words(s: &str) -> Vec<String> {
        s.split(' ').map(String::from).collect()
    }

    fn temp_model(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("miner-crfgen-{}", std::process::id()))
            .join(name)
    }

    fn conf() -> CrfConfig {
        CrfConfig {
            feature_template: vec!["word[0]".to_string(), "shape[0]".to_string()],
            middle_label: false,
            epochs: 10,
            ..CrfConfig::default()
        }
    }

    /// Backend that answers every token with a fixed label.
    struct FixedBackend(&'static str);

    impl SequenceBackend for FixedBackend {
        fn train(&mut self, _: &[FeatureSeq], _: &[Vec<String>], path: &Path) -> std::result::Result<PathBuf, BackendError> {
            Ok(path.to_path_buf())
        }
        fn open(&mut self, _: &Path) -> std::result::Result<(), BackendError> {
            Ok(())
        }
        fn close(&mut self) {}
        fn is_open(&self) -> bool {
            true
        }
        fn tag(&self, xseq: &FeatureSeq) -> std::result::Result<Vec<String>, BackendError> {
            Ok(vec![self.0.to_string(); xseq.len()])
        }
    }

    #[test]
    fn test_tag_before_training_is_model_not_found() {
        let mut gen = CrfGen::with_model(&conf(), temp_model("absent.model")).unwrap();
        let err = gen.generate(&words("a b"), &words("  ")).unwrap_err();
        assert!(matches!(err, MinerError::ModelNotFound(_)));
        assert!(matches!(
            CrfGen::for_tagging(&CrfConfig { model_filename: "/nonexistent/m".into(), ..conf() }),
            Err(MinerError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_dummy_from_tagger_is_labeling_error() {
        let extractor = FeatureExtractor::new(&["word[0]"], None).unwrap();
        let mut gen = CrfGen::new(temp_model("fixed.model"), extractor, Box::new(FixedBackend("N")));
        let mut table = TemplateTable::new();
        let err = gen.process_line(&mut table, &words("a b"), &words("  ")).unwrap_err();
        assert!(matches!(err, MinerError::Labeling(_)));
        assert!(table.is_empty());
    }

    #[test]
    fn test_unknown_label_from_tagger() {
        let extractor = FeatureExtractor::new(&["word[0]"], None).unwrap();
        let mut gen = CrfGen::new(temp_model("fixed.model"), extractor, Box::new(FixedBackend("Q")));
        assert!(matches!(
            gen.generate(&words("a"), &words("")),
            Err(MinerError::Labeling(_))
        ));
    }

    #[test]
    fn test_train_rejects_unlabeled_items() {
        let mut gen = CrfGen::with_model(&conf(), temp_model("unlabeled.model")).unwrap();
        let line = labeled(&[("a", Label::Description), ("b", Label::Dummy)]);
        let err = gen.train([line.as_slice()]).unwrap_err();
        assert!(matches!(err, MinerError::Labeling(_)));
    }

    #[test]
    fn test_train_then_process_line() {
        let path = temp_model("trained.model");
        let mut gen = CrfGen::with_model(&conf(), &path).unwrap();
        let train = vec![
            labeled(&[("session", Label::Description), ("12", Label::Variable), ("opened", Label::Description)]),
            labeled(&[("session", Label::Description), ("4", Label::Variable), ("opened", Label::Description)]),
            labeled(&[("port", Label::Description), ("80", Label::Variable), ("down", Label::Description)]),
        ];
        let written = gen.train(train.iter().map(|l| l.as_slice())).unwrap();
        assert_eq!(written, path);

        let mut table = TemplateTable::new();
        let seps = words("  ");
        let out = gen.process_line(&mut table, &words("session 31 opened"), &seps).unwrap();
        assert_eq!(out, Outcome::Added(0));
        assert_eq!(
            table.get(0).unwrap(),
            &Template::from_words(&["session", "*", "opened"], "*")
        );
        let out = gen.process_line(&mut table, &words("session 99 opened"), &seps).unwrap();
        assert_eq!(out, Outcome::Unchanged(0));
        std::fs::remove_file(&path).ok();
    }
}
