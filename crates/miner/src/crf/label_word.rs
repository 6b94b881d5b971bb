//! Word classes used as intermediate ("middle") labels.
//!
//! A coarse class such as `DIGIT` or `IPv4ADDR` generalises across values the
//! tagger never saw during training.

use std::collections::HashSet;
use std::net::IpAddr;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WordClass {
    Ipv4Addr,
    Ipv6Addr,
    Host,
    Digit,
    Date,
    Time,
    Other,
}

impl WordClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            WordClass::Ipv4Addr => "IPv4ADDR",
            WordClass::Ipv6Addr => "IPv6ADDR",
            WordClass::Host => "HOST",
            WordClass::Digit => "DIGIT",
            WordClass::Date => "DATE",
            WordClass::Time => "TIME",
            WordClass::Other => "OTHER",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LabelWord {
    patterns: Vec<(WordClass, Regex)>,
    hosts: HashSet<String>,
}

impl LabelWord {
    pub fn new<I, S>(known_hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        // Literal patterns; compilation cannot fail.
        let compile = |re: &str| Regex::new(re).expect("word class pattern");
        let patterns = vec![
            (WordClass::Digit, compile(r"^\d+$")),
            (WordClass::Date, compile(r"^\d{2}/\d{2}$")),
            (WordClass::Date, compile(r"^\d{4}-\d{2}-\d{2}")),
            (WordClass::Time, compile(r"^\d{2}:\d{2}:\d{2}$")),
        ];
        Self {
            patterns,
            hosts: known_hosts.into_iter().map(Into::into).collect(),
        }
    }

    pub fn label(&self, word: &str) -> WordClass {
        if let Some(class) = Self::ip_class(word) {
            return class;
        }
        if self.hosts.contains(word) {
            return WordClass::Host;
        }
        self.patterns
            .iter()
            .find(|(_, re)| re.is_match(word))
            .map(|(class, _)| *class)
            .unwrap_or(WordClass::Other)
    }

    fn ip_class(word: &str) -> Option<WordClass> {
        match word.parse::<IpAddr>().ok()? {
            IpAddr::V4(_) => Some(WordClass::Ipv4Addr),
            IpAddr::V6(_) => Some(WordClass::Ipv6Addr),
        }
    }
}

impl Default for LabelWord {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}

/// Collapse a word to its character shape: runs of digits become `0`,
/// letters `a`/`A`, other characters kept verbatim.
pub fn word_shape(word: &str) -> String {
    let mut shape = String::with_capacity(word.len());
    let mut last = None;
    for c in word.chars() {
        let class = if c.is_ascii_digit() {
            '0'
        } else if c.is_uppercase() {
            'A'
        } else if c.is_alphabetic() {
            'a'
        } else {
            c
        };
        if last != Some(class) || !matches!(class, '0' | 'a' | 'A') {
            shape.push(class);
        }
        last = Some(class);
    }
    shape
}
