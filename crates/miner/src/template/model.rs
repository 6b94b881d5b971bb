//! Model — Token and Template types.

use std::fmt;
use serde::{Deserialize, Serialize};

/// Template identifier in the Template Table namespace.
pub type Tid = usize;

/// A single template position: a fixed word or the variable placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Token {
    Word(String),
    Var,
}

impl Token {
    pub fn is_var(&self) -> bool {
        matches!(self, Token::Var)
    }

    /// Render with `sym` standing in for the variable placeholder.
    pub fn as_str<'a>(&'a self, sym: &'a str) -> &'a str {
        match self {
            Token::Word(w) => w,
            Token::Var => sym,
        }
    }
}

/// Ordered, fixed-length token pattern.
///
/// Equality is token-for-token; `Var` equals only `Var`. The variable
/// symbol is a presentation concern and lives outside the type, so the same
/// template compares equal regardless of which symbol a run uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Template {
    tokens: Vec<Token>,
}

impl Template {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    /// Parse a pattern where every word equal to `sym` is a variable.
    pub fn from_words<S: AsRef<str>>(words: &[S], sym: &str) -> Self {
        let tokens = words
            .iter()
            .map(|w| {
                let w = w.as_ref();
                if w == sym {
                    Token::Var
                } else {
                    Token::Word(w.to_string())
                }
            })
            .collect();
        Self { tokens }
    }

    /// A template with every position fixed to the given line words.
    pub fn literal<S: AsRef<str>>(words: &[S]) -> Self {
        Self {
            tokens: words.iter().map(|w| Token::Word(w.as_ref().to_string())).collect(),
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn var_count(&self) -> usize {
        self.tokens.iter().filter(|t| t.is_var()).count()
    }

    /// True if `line` has the same length and agrees on every fixed position.
    pub fn matches<S: AsRef<str>>(&self, line: &[S]) -> bool {
        self.tokens.len() == line.len()
            && self.tokens.iter().zip(line).all(|(t, w)| match t {
                Token::Var => true,
                Token::Word(fixed) => fixed == w.as_ref(),
            })
    }

    /// True if every line matched by `self` is also matched by `general`.
    pub fn is_specialization_of(&self, general: &Template) -> bool {
        self.tokens.len() == general.tokens.len()
            && self.tokens.iter().zip(&general.tokens).all(|(s, g)| match (s, g) {
                (_, Token::Var) => true,
                (Token::Word(a), Token::Word(b)) => a == b,
                (Token::Var, Token::Word(_)) => false,
            })
    }

    /// Positions where `self` and `other` disagree. Both must have equal length.
    pub fn diff_positions(&self, other: &Template) -> Vec<usize> {
        self.tokens
            .iter()
            .zip(&other.tokens)
            .enumerate()
            .filter(|(_, (a, b))| a != b)
            .map(|(i, _)| i)
            .collect()
    }

    pub(crate) fn with_token(&self, position: usize, token: Token) -> Self {
        let mut tokens = self.tokens.clone();
        tokens[position] = token;
        Self { tokens }
    }

    pub fn words(&self, sym: &str) -> Vec<String> {
        self.tokens.iter().map(|t| t.as_str(sym).to_string()).collect()
    }

    pub fn display<'a>(&'a self, sym: &'a str) -> TemplateDisplay<'a> {
        TemplateDisplay { template: self, sym }
    }
}

/// Space-joined rendering of a template with a chosen variable symbol.
pub struct TemplateDisplay<'a> {
    template: &'a Template,
    sym: &'a str,
}

impl fmt::Display for TemplateDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.template.tokens.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(token.as_str(self.sym))?;
        }
        Ok(())
    }
}
