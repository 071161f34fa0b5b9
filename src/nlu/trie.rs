//! Character trie mapping keywords to their catalog origin.

use super::catalog::FunctionCatalog;
use crate::functions::ArgValue;
use std::collections::HashMap;

/// Where a keyword came from.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordInfo {
    pub keyword: String,
    pub function: String,
    /// `None` for a function-name synonym, otherwise the parameter it fills.
    pub param: Option<String>,
    /// The enum value selected by this keyword.
    pub value: Option<ArgValue>,
}

impl KeywordInfo {
    /// A keyword naming a function.
    pub fn synonym(keyword: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            function: function.into(),
            param: None,
            value: None,
        }
    }

    /// A keyword selecting `value` for `param` of `function`.
    pub fn enum_value(
        keyword: impl Into<String>,
        function: impl Into<String>,
        param: impl Into<String>,
        value: ArgValue,
    ) -> Self {
        Self {
            keyword: keyword.into(),
            function: function.into(),
            param: Some(param.into()),
            value: Some(value),
        }
    }

    pub fn is_synonym(&self) -> bool {
        self.param.is_none()
    }
}

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<char, TrieNode>,
    infos: Vec<KeywordInfo>,
}

/// Exact-match keyword lookup.
#[derive(Debug, Default)]
pub struct KeywordTrie {
    root: TrieNode,
    len: usize,
}

impl KeywordTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every synonym and enum keyword of the catalog.
    pub fn from_catalog(catalog: &FunctionCatalog) -> Self {
        let mut trie = Self::new();
        for f in &catalog.functions {
            for synonym in &f.name_synonyms {
                trie.insert(KeywordInfo::synonym(synonym, &f.name));
            }
            for p in &f.parameters {
                for v in &p.enum_values {
                    for keyword in &v.keywords {
                        trie.insert(KeywordInfo::enum_value(
                            keyword,
                            &f.name,
                            &p.name,
                            v.value.clone(),
                        ));
                    }
                }
            }
        }
        trie
    }

    pub fn insert(&mut self, info: KeywordInfo) {
        let mut node = &mut self.root;
        for c in info.keyword.chars() {
            node = node.children.entry(c).or_default();
        }
        node.infos.push(info);
        self.len += 1;
    }

    /// Entries whose keyword is exactly `phrase`. Prefixes never match.
    pub fn search(&self, phrase: &str) -> &[KeywordInfo] {
        let mut node = &self.root;
        for c in phrase.chars() {
            match node.children.get(&c) {
                Some(next) => node = next,
                None => return &[],
            }
        }
        &node.infos
    }

    /// Number of inserted entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_only() {
        let mut trie = KeywordTrie::new();
        trie.insert(KeywordInfo::synonym("移动", "ModifyTransform"));
        assert_eq!(trie.search("移动").len(), 1);
        assert!(trie.search("移").is_empty());
        assert!(trie.search("移动吧").is_empty());
        assert!(trie.search("").is_empty());
    }

    #[test]
    fn shared_keyword_keeps_all_entries() {
        let mut trie = KeywordTrie::new();
        trie.insert(KeywordInfo::synonym("red", "ChangeObjectColor"));
        trie.insert(KeywordInfo::enum_value(
            "red",
            "ChangeObjectColor",
            "hexColor",
            ArgValue::from("#FF0000"),
        ));
        let found = trie.search("red");
        assert_eq!(found.len(), 2);
        assert!(found[0].is_synonym());
        assert_eq!(found[1].param.as_deref(), Some("hexColor"));
        assert_eq!(trie.len(), 2);
    }
}
