//! Local keyword matching: catalog, trie, tokenizer, numerals, and matcher.

pub mod catalog;
pub mod matcher;
pub mod numerals;
pub mod tokenizer;
pub mod trie;

pub use catalog::FunctionCatalog;
pub use matcher::{CommandCandidate, CommandMatcher};
pub use numerals::parse_number;
pub use tokenizer::{DictionaryTokenizer, NumberPreservingTokenizer, Tokenizer};
pub use trie::{KeywordInfo, KeywordTrie};
