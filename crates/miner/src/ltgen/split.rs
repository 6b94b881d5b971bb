//! Split — tokenizer contract and a whitespace implementation.

/// Splits a raw message into words and the separators following each word.
pub trait Tokenizer: Send + Sync {
    fn split(&self, message: &str) -> (Vec<String>, Vec<String>);
}

/// Splits on runs of whitespace. Leading whitespace is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordSplitter;

impl Tokenizer for WordSplitter {
    fn split(&self, message: &str) -> (Vec<String>, Vec<String>) {
        let mut words = Vec::new();
        let mut seps = Vec::new();
        let mut rest = message.trim_start();
        while !rest.is_empty() {
            let word_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            words.push(rest[..word_end].to_string());
            rest = &rest[word_end..];
            let sep_end = rest
                .find(|c: char| !c.is_whitespace())
                .unwrap_or(rest.len());
            seps.push(rest[..sep_end].to_string());
            rest = &rest[sep_end..];
        }
        (words, seps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keeps_separators() {
        let (words, seps) = WordSplitter.split("  ERROR  disk0\tfailed");
        assert_eq!(words, vec!["ERROR", "disk0", "failed"]);
        assert_eq!(seps, vec!["  ", "\t", ""]);
    }

    #[test]
    fn test_split_empty() {
        let (words, seps) = WordSplitter.split("   ");
        assert!(words.is_empty());
        assert!(seps.is_empty());
    }
}
