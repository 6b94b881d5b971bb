//! Feature extraction from labeled line items.

use std::fmt;

use crate::error::{MinerError, Result};
use super::items::{Label, LineItem};
use super::label_word::{word_shape, LabelWord};

const BOS: &str = "__BOS__";
const EOS: &str = "__EOS__";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Word,
    Shape,
    Class,
}

/// One entry of a feature template, e.g. `word[-1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSpec {
    pub kind: FeatureKind,
    pub offset: isize,
}

impl FeatureSpec {
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = || MinerError::Config(format!("invalid feature spec {:?}", spec));
        let spec = spec.trim();
        let (name, rest) = spec.split_once('[').ok_or_else(invalid)?;
        let offset = rest
            .strip_suffix(']')
            .and_then(|n| n.trim().parse::<isize>().ok())
            .ok_or_else(invalid)?;
        let kind = match name.trim() {
            "word" => FeatureKind::Word,
            "shape" => FeatureKind::Shape,
            "class" => FeatureKind::Class,
            _ => return Err(invalid()),
        };
        Ok(Self { kind, offset })
    }
}

impl fmt::Display for FeatureSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.kind {
            FeatureKind::Word => "word",
            FeatureKind::Shape => "shape",
            FeatureKind::Class => "class",
        };
        write!(f, "{}[{}]", name, self.offset)
    }
}

/// Turns a line into per-token feature strings and label strings.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    specs: Vec<FeatureSpec>,
    label_word: Option<LabelWord>,
}

impl FeatureExtractor {
    pub fn new<S: AsRef<str>>(template: &[S], label_word: Option<LabelWord>) -> Result<Self> {
        let specs = template
            .iter()
            .map(|s| FeatureSpec::parse(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { specs, label_word })
    }

    /// Feature sequence, one feature list per item.
    ///
    /// `class` features are emitted only when a word classifier is configured.
    pub fn feature(&self, items: &[LineItem]) -> Vec<Vec<String>> {
        let len = items.len() as isize;
        (0..len)
            .map(|pos| {
                let mut features = Vec::with_capacity(self.specs.len() + 1);
                features.push("bias".to_string());
                for spec in &self.specs {
                    let at = pos + spec.offset;
                    let value = if at < 0 {
                        BOS.to_string()
                    } else if at >= len {
                        EOS.to_string()
                    } else {
                        let word = &items[at as usize].word;
                        match spec.kind {
                            FeatureKind::Word => word.clone(),
                            FeatureKind::Shape => word_shape(word),
                            FeatureKind::Class => match &self.label_word {
                                Some(lw) => lw.label(word).as_str().to_string(),
                                None => continue,
                            },
                        }
                    };
                    features.push(format!("{}={}", spec, value));
                }
                features
            })
            .collect()
    }

    pub fn label(&self, items: &[LineItem]) -> Vec<String> {
        items.iter().map(|i| i.label.as_str().to_string()).collect()
    }

    pub fn parse_labels<S: AsRef<str>>(labels: &[S]) -> Result<Vec<Label>> {
        labels
            .iter()
            .map(|l| {
                Label::parse(l.as_ref())
                    .ok_or_else(|| MinerError::Labeling(format!("unknown label {:?}", l.as_ref())))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crf::items::line_to_items;

    #[test]
    fn test_parse_spec() {
        assert_eq!(
            FeatureSpec::parse("word[-2]").unwrap(),
            FeatureSpec { kind: FeatureKind::Word, offset: -2 }
        );
        assert_eq!(FeatureSpec::parse(" class[1] ").unwrap().kind, FeatureKind::Class);
        assert!(FeatureSpec::parse("word").is_err());
        assert!(FeatureSpec::parse("color[0]").is_err());
        assert!(FeatureSpec::parse("word[x]").is_err());
    }

    #[test]
    fn test_feature_padding() {
        let fx = FeatureExtractor::new(&["word[-1]", "word[0]", "word[1]"], None).unwrap();
        let items = line_to_items(&["a", "b"], &[" ", ""]);
        let fs = fx.feature(&items);
        assert_eq!(fs[0], vec!["bias", "word[-1]=__BOS__", "word[0]=a", "word[1]=b"]);
        assert_eq!(fs[1], vec!["bias", "word[-1]=a", "word[0]=b", "word[1]=__EOS__"]);
    }

    #[test]
    fn test_class_features_need_classifier() {
        let items = line_to_items(&["10.0.0.1"], &[""]);
        let without = FeatureExtractor::new(&["class[0]"], None).unwrap();
        assert_eq!(without.feature(&items)[0], vec!["bias"]);
        let with = FeatureExtractor::new(&["class[0]"], Some(LabelWord::default())).unwrap();
        assert_eq!(with.feature(&items)[0], vec!["bias", "class[0]=IPv4ADDR"]);
    }

    #[test]
    fn test_parse_labels_rejects_unknown() {
        assert_eq!(
            FeatureExtractor::parse_labels(&["D", "V", "N"]).unwrap(),
            vec![Label::Description, Label::Variable, Label::Dummy]
        );
        assert!(FeatureExtractor::parse_labels(&["X"]).is_err());
    }
}
