//! Items — labeled line items and the JSON-lines labeled corpus.
//!
//! A corpus file holds one log line per text line:
//!
//! ```text
//! {"tid":0,"host":"web1","dt":"2024-01-01T00:00:00","items":[["ERROR"," ","D"],["disk0"," ","V"]]}
//! ```
//!
//! Only `items` is required.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{MinerError, Result};
use crate::template::{Template, Tid, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "D")]
    Description,
    #[serde(rename = "V")]
    Variable,
    /// Placeholder for "not labeled yet". Never valid tagger output.
    #[serde(rename = "N")]
    Dummy,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Description => "D",
            Label::Variable => "V",
            Label::Dummy => "N",
        }
    }

    pub fn parse(s: &str) -> Option<Label> {
        match s {
            "D" => Some(Label::Description),
            "V" => Some(Label::Variable),
            "N" => Some(Label::Dummy),
            _ => None,
        }
    }
}

type RawItem = (String, String, Label);

/// One token of a line with the separator that followed it and its label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawItem", into = "RawItem")]
pub struct LineItem {
    pub word: String,
    pub sep: String,
    pub label: Label,
}

impl From<RawItem> for LineItem {
    fn from((word, sep, label): RawItem) -> Self {
        Self { word, sep, label }
    }
}

impl From<LineItem> for RawItem {
    fn from(item: LineItem) -> Self {
        (item.word, item.sep, item.label)
    }
}

/// A labeled log line with optional database metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledLine {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tid: Option<Tid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dt: Option<NaiveDateTime>,
    pub items: Vec<LineItem>,
}

impl LabeledLine {
    pub fn new(items: Vec<LineItem>) -> Self {
        Self {
            tid: None,
            gid: None,
            host: None,
            dt: None,
            items,
        }
    }

    pub fn words(&self) -> Vec<String> {
        self.items.iter().map(|i| i.word.clone()).collect()
    }

    pub fn labels(&self) -> Vec<Label> {
        items_to_labels(&self.items)
    }

    /// Ground-truth template of this line.
    pub fn template(&self) -> Result<Template> {
        items_to_template(&self.items)
    }
}

/// Unlabeled items for tagging; every label is `Dummy`.
pub fn line_to_items<S: AsRef<str>>(words: &[S], seps: &[S]) -> Vec<LineItem> {
    words
        .iter()
        .enumerate()
        .map(|(i, w)| LineItem {
            word: w.as_ref().to_string(),
            sep: seps.get(i).map(|s| s.as_ref().to_string()).unwrap_or_default(),
            label: Label::Dummy,
        })
        .collect()
}

pub fn items_to_labels(items: &[LineItem]) -> Vec<Label> {
    items.iter().map(|i| i.label).collect()
}

pub fn items_to_template(items: &[LineItem]) -> Result<Template> {
    let words: Vec<&str> = items.iter().map(|i| i.word.as_str()).collect();
    labels_to_template(&words, &items_to_labels(items))
}

/// Keep `Description` words, turn `Variable` words into placeholders.
pub fn labels_to_template<S: AsRef<str>>(words: &[S], labels: &[Label]) -> Result<Template> {
    if words.len() != labels.len() {
        return Err(MinerError::Labeling(format!(
            "{} labels for {} words",
            labels.len(),
            words.len()
        )));
    }
    let tokens = words
        .iter()
        .zip(labels)
        .map(|(w, label)| match label {
            Label::Description => Ok(Token::Word(w.as_ref().to_string())),
            Label::Variable => Ok(Token::Var),
            Label::Dummy => Err(MinerError::Labeling(format!(
                "word {:?} labeled as dummy",
                w.as_ref()
            ))),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Template::new(tokens))
}

/// Label the words of a line against a known template.
pub fn template_to_items<S: AsRef<str>>(tpl: &Template, words: &[S], seps: &[S]) -> Result<Vec<LineItem>> {
    if !tpl.matches(words) {
        return Err(MinerError::Labeling("line does not match its template".to_string()));
    }
    let mut items = line_to_items(words, seps);
    for (item, token) in items.iter_mut().zip(tpl.tokens()) {
        item.label = if token.is_var() { Label::Variable } else { Label::Description };
    }
    Ok(items)
}

/// Handle to a labeled corpus file; every `iter()` rereads from the start.
#[derive(Debug, Clone)]
pub struct LabeledCorpus {
    path: PathBuf,
}

impl LabeledCorpus {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(MinerError::NotFound(format!("labeled corpus {}", path.display())));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn iter(&self) -> Result<CorpusIter> {
        let file = File::open(&self.path)?;
        Ok(CorpusIter {
            lines: BufReader::new(file).lines(),
            lineno: 0,
        })
    }
}

/// Lazy reader over a corpus file.
pub struct CorpusIter {
    lines: Lines<BufReader<File>>,
    lineno: usize,
}

impl Iterator for CorpusIter {
    type Item = Result<LabeledLine>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.lineno += 1;
            if line.trim().is_empty() {
                continue;
            }
            let lineno = self.lineno;
            return Some(
                serde_json::from_str(&line)
                    .map_err(|source| MinerError::Corpus { line: lineno, source }),
            );
        }
    }
}

pub fn iter_items_from_file(path: impl AsRef<Path>) -> Result<CorpusIter> {
    LabeledCorpus::open(path)?.iter()
}

pub fn write_corpus<'a>(path: impl AsRef<Path>, lines: impl IntoIterator<Item = &'a LabeledLine>) -> Result<usize> {
    let mut writer = BufWriter::new(File::create(path)?);
    let mut count = 0;
    for line in lines {
        let encoded = serde_json::to_string(line)
            .map_err(|source| MinerError::Corpus { line: count + 1, source })?;
        writeln!(writer, "{}", encoded)?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(word: &str, label: Label) -> LineItem {
        LineItem { word: word.to_string(), sep: " ".to_string(), label }
    }

    #[test]
    fn test_line_to_items_all_dummy() {
        let items = line_to_items(&["a", "b"], &[" "]);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.label == Label::Dummy));
        assert_eq!(items[0].sep, " ");
        assert_eq!(items[1].sep, "");
    }

    #[test]
    fn test_items_to_template() {
        let items = vec![
            item("ERROR", Label::Description),
            item("disk0", Label::Variable),
            item("failed", Label::Description),
        ];
        let tpl = items_to_template(&items).unwrap();
        assert_eq!(tpl, Template::from_words(&["ERROR", "*", "failed"], "*"));
    }

    #[test]
    fn test_dummy_label_is_labeling_error() {
        let items = vec![item("x", Label::Description), item("y", Label::Dummy)];
        let err = items_to_template(&items).unwrap_err();
        assert!(matches!(err, MinerError::Labeling(_)));
    }

    #[test]
    fn test_template_to_items_labels_positions() {
        let tpl = Template::from_words(&["user", "*", "login"], "*");
        let items = template_to_items(&tpl, &["user", "bob", "login"], &[" ", " ", ""]).unwrap();
        assert_eq!(
            items_to_labels(&items),
            vec![Label::Description, Label::Variable, Label::Description]
        );
        assert!(template_to_items(&tpl, &["user", "bob"], &[" ", ""]).is_err());
    }

    #[test]
    fn test_item_serializes_as_triple() {
        let json = serde_json::to_string(&item("ok", Label::Variable)).unwrap();
        assert_eq!(json, r#"["ok"," ","V"]"#);
    }

    #[test]
    fn test_corpus_is_restartable() {
        let dir = std::env::temp_dir().join(format!("miner-items-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("corpus.jsonl");
        let mut line = LabeledLine::new(vec![item("a", Label::Description), item("1", Label::Variable)]);
        line.tid = Some(4);
        write_corpus(&path, [&line, &line]).unwrap();

        let corpus = LabeledCorpus::open(&path).unwrap();
        let first: Vec<_> = corpus.iter().unwrap().collect::<Result<_>>().unwrap();
        let second: Vec<_> = corpus.iter().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(first[0].tid, Some(4));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corpus_reports_bad_line_number() {
        let dir = std::env::temp_dir().join(format!("miner-items-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("corpus.jsonl");
        std::fs::write(&path, "{\"items\":[]}\n\nnot json\n").unwrap();

        let results: Vec<_> = iter_items_from_file(&path).unwrap().collect();
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(MinerError::Corpus { line: 3, .. })));
        std::fs::remove_dir_all(&dir).ok();
    }
}
