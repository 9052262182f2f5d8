use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use snafu::ResultExt;
use tracing::*;

use crate::error::{HtrError, IoReadSnafu};

#[derive(Debug, Clone, Default)]
struct Node {
    children: BTreeMap<char, usize>,
    is_word: bool,
}

/// Dictionary trie used to constrain word beam search.
#[derive(Debug, Clone)]
pub struct PrefixTree {
    nodes: Vec<Node>,
    words: usize,
    word_chars: BTreeSet<char>,
}

impl Default for PrefixTree {
    fn default() -> Self {
        Self {
            nodes: vec![Node::default()],
            words: 0,
            word_chars: BTreeSet::new(),
        }
    }
}

impl PrefixTree {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::default();
        for word in words {
            tree.insert(word.as_ref());
        }
        tree
    }

    /// Reads a word list with one word per line. Empty lines are skipped.
    pub fn load_word_list<P: AsRef<Path>>(path: P, uppercase: bool) -> Result<Self, HtrError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).context(IoReadSnafu {
            path: path.to_string_lossy(),
        })?;

        let tree = Self::new(
            content
                .lines()
                .map(str::trim)
                .filter(|word| !word.is_empty())
                .map(|word| {
                    if uppercase {
                        word.to_uppercase()
                    } else {
                        word.to_string()
                    }
                }),
        );

        info!("loaded {} dictionary words from {}", tree.len(), path.display());
        Ok(tree)
    }

    pub fn insert(&mut self, word: &str) {
        if word.is_empty() {
            return;
        }

        let mut node = 0;
        for c in word.chars() {
            self.word_chars.insert(c);
            node = match self.nodes[node].children.get(&c) {
                Some(&child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(Node::default());
                    self.nodes[node].children.insert(c, child);
                    child
                }
            };
        }

        if !self.nodes[node].is_word {
            self.nodes[node].is_word = true;
            self.words += 1;
        }
    }

    fn node(&self, prefix: &str) -> Option<usize> {
        prefix
            .chars()
            .try_fold(0, |node, c| self.nodes[node].children.get(&c).copied())
    }

    pub fn contains_prefix(&self, prefix: &str) -> bool {
        self.node(prefix).is_some()
    }

    pub fn is_word(&self, text: &str) -> bool {
        self.node(text).is_some_and(|node| self.nodes[node].is_word)
    }

    /// Characters that may follow `prefix` inside a dictionary word.
    pub fn next_chars(&self, prefix: &str) -> Vec<char> {
        self.node(prefix)
            .map(|node| self.nodes[node].children.keys().copied().collect())
            .unwrap_or_default()
    }

    /// All dictionary words starting with `prefix`, in lexical order.
    pub fn completions(&self, prefix: &str) -> Vec<String> {
        let Some(start) = self.node(prefix) else {
            return Vec::new();
        };

        let mut words = Vec::new();
        let mut stack = vec![(start, prefix.to_string())];
        while let Some((node, text)) = stack.pop() {
            if self.nodes[node].is_word {
                words.push(text.clone());
            }
            for (c, &child) in self.nodes[node].children.iter().rev() {
                let mut next = text.clone();
                next.push(*c);
                stack.push((child, next));
            }
        }
        words
    }

    /// Characters occurring in at least one dictionary word.
    pub fn word_chars(&self) -> &BTreeSet<char> {
        &self.word_chars
    }

    /// Number of distinct words.
    pub fn len(&self) -> usize {
        self.words
    }

    pub fn is_empty(&self) -> bool {
        self.words == 0
    }
}
