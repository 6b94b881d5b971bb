//! Heuristic — variable detection from word classes and digit density.

use crate::conf::HeuristicConfig;
use crate::crf::{LabelWord, WordClass};
use crate::error::Result;
use crate::template::{Template, Token};
use super::traits::TemplateGenerator;

pub struct HeuristicGen {
    label_word: LabelWord,
    digit_ratio: f64,
}

impl HeuristicGen {
    pub fn new(label_word: LabelWord, conf: &HeuristicConfig) -> Self {
        Self {
            label_word,
            digit_ratio: conf.digit_ratio,
        }
    }

    fn is_variable(&self, word: &str) -> bool {
        if self.label_word.label(word) != WordClass::Other {
            return true;
        }
        let total = word.chars().count();
        if total == 0 {
            return false;
        }
        let digits = word.chars().filter(|c| c.is_ascii_digit()).count();
        digits as f64 / total as f64 >= self.digit_ratio
    }
}

impl TemplateGenerator for HeuristicGen {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn generate(&mut self, words: &[String], _seps: &[String]) -> Result<Option<Template>> {
        let tokens = words
            .iter()
            .map(|w| {
                if self.is_variable(w) {
                    Token::Var
                } else {
                    Token::Word(w.clone())
                }
            })
            .collect();
        Ok(Some(Template::new(tokens)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ltgen::traits::Outcome;
    use crate::template::TemplateTable;

    fn words(s: &str) -> Vec<String> {
        s.split(' ').map(String::from).collect()
    }

    #[test]
    fn test_classes_and_digits_become_variables() {
        let mut gen = HeuristicGen::new(LabelWord::new(["web01"]), &HeuristicConfig::default());
        let tpl = gen
            .generate(&words("connect from 10.0.0.5 to web01 port p8080 as root"), &[])
            .unwrap()
            .unwrap();
        assert_eq!(
            tpl,
            Template::from_words(&["connect", "from", "*", "to", "*", "port", "*", "as", "root"], "*")
        );
    }

    #[test]
    fn test_lines_share_template() {
        let mut gen = HeuristicGen::new(LabelWord::default(), &HeuristicConfig::default());
        let mut table = TemplateTable::new();
        let a = gen.process_line(&mut table, &words("job 17 done"), &[]).unwrap();
        let b = gen.process_line(&mut table, &words("job 18 done"), &[]).unwrap();
        assert_eq!(a, Outcome::Added(0));
        assert_eq!(b, Outcome::Unchanged(0));
    }
}
