//! Word segmentation for the keyword matcher.
//!
//! [`DictionaryTokenizer`] does forward maximum matching over a vocabulary
//! (normally the catalog's keywords). [`NumberPreservingTokenizer`] wraps any
//! tokenizer so numeric spans survive as single tokens.

use super::numerals::parse_number;
use crate::error::{Result, VoiceError};
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Splits recognized text into tokens.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Numeric spans kept atomic: Arabic literals or runs of Chinese numeral characters.
pub const NUMBER_PATTERN: &str = r"([+\-]?\d+(\.\d+)?)|([一二三四五六七八九十百千万亿零点]+)";

// ---------------------------------------------------------------------------
// Dictionary tokenizer
// ---------------------------------------------------------------------------

/// Forward-maximum-match segmenter.
///
/// At each position the longest vocabulary word wins. Otherwise a run of
/// ASCII letters, digits, and `_` forms one token, whitespace and punctuation
/// are dropped, and any other character becomes a single-char token.
#[derive(Debug, Default, Clone)]
pub struct DictionaryTokenizer {
    words: HashSet<String>,
    /// Longest word length in chars.
    max_len: usize,
}

impl DictionaryTokenizer {
    pub fn new<I, S>(vocabulary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tokenizer = Self::default();
        for word in vocabulary {
            tokenizer.add_word(word);
        }
        tokenizer
    }

    /// Add a word. Empty and whitespace-only words are ignored.
    pub fn add_word(&mut self, word: impl Into<String>) {
        let word = word.into();
        if word.trim().is_empty() {
            return;
        }
        self.max_len = self.max_len.max(word.chars().count());
        self.words.insert(word);
    }

    pub fn vocabulary_len(&self) -> usize {
        self.words.len()
    }

    fn longest_match(&self, chars: &[char], start: usize) -> Option<usize> {
        let limit = self.max_len.min(chars.len() - start);
        (1..=limit).rev().find(|&len| {
            let candidate: String = chars[start..start + len].iter().collect();
            self.words.contains(&candidate)
        })
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c.is_ascii_punctuation() || is_cjk_punctuation(c)
}

fn is_cjk_punctuation(c: char) -> bool {
    matches!(
        c,
        '，' | '。' | '！' | '？' | '、' | '；' | '：' | '“' | '”' | '‘' | '’' | '（' | '）'
            | '《' | '》' | '【' | '】' | '…' | '—' | '～'
    )
}

impl Tokenizer for DictionaryTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut tokens = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            if let Some(len) = self.longest_match(&chars, i) {
                tokens.push(chars[i..i + len].iter().collect());
                i += len;
                continue;
            }
            let c = chars[i];
            if is_word_char(c) {
                let start = i;
                while i < chars.len() && is_word_char(chars[i]) {
                    i += 1;
                }
                tokens.push(chars[start..i].iter().collect());
            } else {
                if !is_separator(c) {
                    tokens.push(c.to_string());
                }
                i += 1;
            }
        }
        tokens
    }
}

// ---------------------------------------------------------------------------
// Number-preserving wrapper
// ---------------------------------------------------------------------------

/// Replaces numeric spans with `__NUM_{i}__` placeholders before inner
/// tokenization and restores them afterwards.
///
/// Only the longest prefix of a span that parses as a number is replaced.
/// The rest stays as text, so `点头` remains a word and `二十点头` yields
/// `二十` followed by `点头`.
#[derive(Debug, Clone)]
pub struct NumberPreservingTokenizer<T> {
    inner: T,
    pattern: Regex,
}

impl<T: Tokenizer> NumberPreservingTokenizer<T> {
    /// Wrap `inner` using [`NUMBER_PATTERN`].
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Config`] if the pattern fails to compile.
    pub fn new(inner: T) -> Result<Self> {
        let pattern = Regex::new(NUMBER_PATTERN)
            .map_err(|e| VoiceError::Config(format!("number pattern: {e}")))?;
        Ok(Self { inner, pattern })
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: Tokenizer> Tokenizer for NumberPreservingTokenizer<T> {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let mut placeholders: HashMap<String, String> = HashMap::new();
        let mut index = 0usize;
        let substituted = self.pattern.replace_all(text, |caps: &regex::Captures<'_>| {
            let span = &caps[0];
            let Some(end) = numeric_prefix_len(span) else {
                return span.to_owned();
            };
            let (number, rest) = span.split_at(end);
            let placeholder = format!("__NUM_{index}__");
            index += 1;
            placeholders.insert(placeholder.clone(), number.to_owned());
            // Padding keeps the placeholder from fusing with adjacent ASCII.
            format!(" {placeholder} {rest}")
        });

        self.inner
            .tokenize(&substituted)
            .into_iter()
            .map(|token| placeholders.remove(&token).unwrap_or(token))
            .collect()
    }
}

/// Byte length of the longest prefix of `span` that parses as a number.
fn numeric_prefix_len(span: &str) -> Option<usize> {
    span.char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .rev()
        .find(|&end| parse_number(&span[..end]).is_some())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn dict() -> DictionaryTokenizer {
        DictionaryTokenizer::new(["移动", "方块", "向左", "红色", "主相机"])
    }

    #[test]
    fn longest_word_wins() {
        let tokenizer = DictionaryTokenizer::new(["主", "主相机", "相机"]);
        assert_eq!(tokenizer.tokenize("主相机"), vec!["主相机"]);
    }

    #[test]
    fn unknown_chars_split_individually() {
        assert_eq!(
            dict().tokenize("把方块移动"),
            vec!["把", "方块", "移动"]
        );
    }

    #[test]
    fn ascii_runs_and_punctuation() {
        assert_eq!(
            dict().tokenize("move the cube, 红色！"),
            vec!["move", "the", "cube", "红色"]
        );
    }

    #[test]
    fn numbers_stay_atomic() {
        let tokenizer = NumberPreservingTokenizer::new(dict()).unwrap();
        assert_eq!(
            tokenizer.tokenize("方块向左移动3.5米"),
            vec!["方块", "向左", "移动", "3.5", "米"]
        );
        assert_eq!(
            tokenizer.tokenize("方块向左移动三米"),
            vec!["方块", "向左", "移动", "三", "米"]
        );
    }

    #[test]
    fn number_next_to_ascii_is_separate() {
        let tokenizer = NumberPreservingTokenizer::new(dict()).unwrap();
        assert_eq!(tokenizer.tokenize("move2m"), vec!["move", "2", "m"]);
    }

    #[test]
    fn unparseable_numeral_chars_stay_in_words() {
        let tokenizer =
            NumberPreservingTokenizer::new(DictionaryTokenizer::new(["方块", "点头"])).unwrap();
        assert_eq!(
            tokenizer.tokenize("把方块点头30"),
            vec!["把", "方块", "点头", "30"]
        );
        assert_eq!(tokenizer.tokenize("二十点头"), vec!["二十", "点头"]);
        assert_eq!(tokenizer.tokenize("三点五"), vec!["三点五"]);
    }

    #[test]
    fn without_wrapper_chinese_numerals_split() {
        assert_eq!(dict().tokenize("二十"), vec!["二", "十"]);
        let tokenizer = NumberPreservingTokenizer::new(dict()).unwrap();
        assert_eq!(tokenizer.tokenize("二十"), vec!["二十"]);
    }
}
