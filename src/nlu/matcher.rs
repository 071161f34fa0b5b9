//! Keyword command matcher.
//!
//! Turns the tokens of one recognized sentence into fully specified
//! [`CommandCandidate`]s. Matching is exact-token only:
//!
//! 1. Tokens that are function-name synonyms open candidates, in first-seen order.
//! 2. A second sweep fills parameters from enum keywords and numeric tokens.
//! 3. Candidates whose declared parameter count is met are kept as pending
//!    commands, up to the configured limit.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use super::catalog::FunctionCatalog;
use super::numerals::parse_number;
use super::tokenizer::{DictionaryTokenizer, NumberPreservingTokenizer, Tokenizer};
use super::trie::KeywordTrie;
use crate::error::Result;
use crate::functions::{ArgValue, Arguments, FunctionRegistry, ParamType};

/// A command recognized from text.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandCandidate {
    pub function: String,
    pub arguments: BTreeMap<String, ArgValue>,
    /// Tokens that contributed, in the order they were consumed.
    pub matched_tokens: Vec<String>,
    /// `1.0` when complete, `0.0` otherwise.
    pub confidence: f32,
}

impl CommandCandidate {
    fn new(function: &str) -> Self {
        Self {
            function: function.to_owned(),
            arguments: BTreeMap::new(),
            matched_tokens: Vec::new(),
            confidence: 0.0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.confidence >= 1.0
    }
}

impl std::fmt::Display for CommandCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let args: Vec<String> = self
            .arguments
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect();
        write!(
            f,
            "{}({}) confidence={:.2} matched=[{}]",
            self.function,
            args.join(", "),
            self.confidence,
            self.matched_tokens.join(", ")
        )
    }
}

/// Catalog-driven matcher holding the commands found in the latest sentence.
pub struct CommandMatcher {
    catalog: FunctionCatalog,
    trie: KeywordTrie,
    tokenizer: Box<dyn Tokenizer>,
    command_limit: usize,
    pending: Vec<CommandCandidate>,
}

impl CommandMatcher {
    /// Build a matcher with the default tokenizer: dictionary segmentation over
    /// the catalog vocabulary, with numbers kept atomic.
    ///
    /// # Errors
    ///
    /// Returns an error if the tokenizer cannot be constructed.
    pub fn new(catalog: FunctionCatalog, command_limit: usize) -> Result<Self> {
        let tokenizer =
            NumberPreservingTokenizer::new(DictionaryTokenizer::new(catalog.vocabulary()))?;
        Ok(Self::with_tokenizer(catalog, command_limit, Box::new(tokenizer)))
    }

    /// Build a matcher around a caller-supplied tokenizer.
    pub fn with_tokenizer(
        catalog: FunctionCatalog,
        command_limit: usize,
        tokenizer: Box<dyn Tokenizer>,
    ) -> Self {
        let trie = KeywordTrie::from_catalog(&catalog);
        info!(
            functions = catalog.len(),
            keywords = trie.len(),
            "keyword matcher ready"
        );
        Self {
            catalog,
            trie,
            tokenizer,
            command_limit: command_limit.max(1),
            pending: Vec::new(),
        }
    }

    pub fn catalog(&self) -> &FunctionCatalog {
        &self.catalog
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.tokenizer.tokenize(text)
    }

    /// Tokenize and match a sentence. Returns the new pending commands.
    pub fn process_text(&mut self, text: &str) -> &[CommandCandidate] {
        let tokens = self.tokenizer.tokenize(text);
        debug!(tokens = ?tokens, "segmented sentence");
        self.process_tokens(&tokens)
    }

    /// Match pre-tokenized text. The result replaces any previous pending commands.
    pub fn process_tokens<S: AsRef<str>>(&mut self, tokens: &[S]) -> &[CommandCandidate] {
        self.pending.clear();

        let mut candidates = self.open_candidates(tokens);
        if candidates.is_empty() {
            debug!("no function synonyms in sentence");
            return &self.pending;
        }
        self.fill_parameters(tokens, &mut candidates);

        for mut candidate in candidates {
            if self.pending.len() >= self.command_limit {
                warn!(limit = self.command_limit, "command limit reached, dropping remaining candidates");
                break;
            }
            let declared = self
                .catalog
                .function(&candidate.function)
                .map_or(0, |f| f.parameters.len());

            if candidate.arguments.len() >= declared {
                candidate.confidence = 1.0;
                info!(command = %candidate, "stored command");
                self.pending.push(candidate);
            } else {
                let missing: Vec<&str> = self
                    .catalog
                    .function(&candidate.function)
                    .map(|f| {
                        f.parameters
                            .iter()
                            .map(|p| p.name.as_str())
                            .filter(|n| !candidate.arguments.contains_key(*n))
                            .collect()
                    })
                    .unwrap_or_default();
                warn!(
                    function = %candidate.function,
                    matched = candidate.arguments.len(),
                    declared,
                    missing = ?missing,
                    "incomplete command"
                );
            }
        }
        &self.pending
    }

    /// Pass 1: distinct functions named by synonyms, in first-seen order.
    fn open_candidates<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<CommandCandidate> {
        let mut candidates: Vec<CommandCandidate> = Vec::new();
        for token in tokens {
            let token = token.as_ref();
            for info in self.trie.search(token).iter().filter(|i| i.is_synonym()) {
                if candidates.iter().any(|c| c.function == info.function) {
                    continue;
                }
                debug!(function = %info.function, keyword = %token, "potential command");
                let mut candidate = CommandCandidate::new(&info.function);
                candidate.matched_tokens.push(token.to_owned());
                candidates.push(candidate);
            }
        }
        candidates
    }

    /// Pass 2: enum keywords and numbers fill unfilled parameters.
    fn fill_parameters<S: AsRef<str>>(&self, tokens: &[S], candidates: &mut [CommandCandidate]) {
        for token in tokens {
            let token = token.as_ref();

            for info in self.trie.search(token).iter().filter(|i| !i.is_synonym()) {
                let (Some(param), Some(value)) = (&info.param, &info.value) else {
                    continue;
                };
                let Some(candidate) = candidates.iter_mut().find(|c| c.function == info.function)
                else {
                    continue;
                };
                if candidate.arguments.contains_key(param) {
                    continue;
                }
                debug!(function = %candidate.function, param = %param, value = %value, "matched enum keyword");
                candidate.arguments.insert(param.clone(), value.clone());
                candidate.matched_tokens.push(token.to_owned());
            }

            let Some(number) = parse_number(token) else {
                continue;
            };
            for candidate in candidates.iter_mut() {
                let Some(function) = self.catalog.function(&candidate.function) else {
                    continue;
                };
                let slot = function.parameters.iter().find(|p| {
                    p.param_type == ParamType::Number && !candidate.arguments.contains_key(&p.name)
                });
                if let Some(p) = slot {
                    debug!(function = %candidate.function, param = %p.name, number, "matched number");
                    candidate
                        .arguments
                        .insert(p.name.clone(), ArgValue::Number(number));
                    candidate.matched_tokens.push(token.to_owned());
                    break;
                }
            }
        }
    }

    /// Commands from the latest sentence awaiting execution.
    pub fn pending(&self) -> &[CommandCandidate] {
        &self.pending
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Run every pending command against `registry` and clear the list.
    ///
    /// Returns one line per command: `✓ <result>` or
    /// `✗ command '<name>' failed: <err>`.
    pub fn execute_pending(&mut self, registry: &FunctionRegistry) -> String {
        let pending = std::mem::take(&mut self.pending);
        info!(count = pending.len(), "executing stored commands");

        let mut lines = Vec::with_capacity(pending.len());
        for command in pending {
            let args = Arguments::from(command.arguments);
            match registry.execute(&command.function, &args) {
                Ok(result) => {
                    info!(function = %command.function, result = %result, "command executed");
                    lines.push(format!("✓ {result}"));
                }
                Err(e) => {
                    tracing::error!(function = %command.function, error = %e, "command failed");
                    lines.push(format!("✗ command '{}' failed: {e}", command.function));
                }
            }
        }
        lines.join("\n")
    }
}

impl std::fmt::Debug for CommandMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandMatcher")
            .field("functions", &self.catalog.len())
            .field("keywords", &self.trie.len())
            .field("command_limit", &self.command_limit)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}
