//! Dictionary Trie
//!
//! Compact prefix tree over lowercase alphabetic words. Built once, then
//! shared read-only (`Arc<DictionaryTrie>`) by every scorer.
//!
//! ## Record format
//!
//! The serialized dictionary is a tree of JSON objects. Each key is either a
//! single lowercase letter mapping to a child node, or the end marker `"$"`
//! mapping to a boolean:
//!
//! ```text
//! { "c": { "a": { "t": { "$": true, "s": { "$": true } } } } }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Serialize, Deserialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

/// Key that marks a node as the end of a word.
pub const END_MARKER: &str = "$";

/// Dictionary loading errors.
#[derive(Debug, Error)]
pub enum DictionaryError {
    /// A node violates the key-or-marker shape.
    #[error("malformed dictionary at {path:?}: {reason}")]
    MalformedDictionary {
        /// Letters leading to the offending node.
        path: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The record is not valid JSON.
    #[error("invalid dictionary JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The binary snapshot could not be decoded.
    #[error("invalid dictionary snapshot: {0}")]
    Snapshot(#[from] bincode::Error),

    /// The dictionary file could not be read.
    #[error("failed to read dictionary: {0}")]
    Io(#[from] std::io::Error),
}

impl DictionaryError {
    fn malformed(path: &str, reason: impl Into<String>) -> Self {
        Self::MalformedDictionary {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// A node in the prefix tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrieNode {
    children: BTreeMap<char, TrieNode>,
    is_end_of_word: bool,
}

impl TrieNode {
    /// Child reached by `letter`, if any.
    pub fn child(&self, letter: char) -> Option<&TrieNode> {
        self.children.get(&letter)
    }

    /// Whether the path to this node spells a dictionary word.
    pub fn is_end_of_word(&self) -> bool {
        self.is_end_of_word
    }

    /// Iterate children in letter order.
    pub fn children(&self) -> impl Iterator<Item = (char, &TrieNode)> {
        self.children.iter().map(|(c, n)| (*c, n))
    }
}

/// Prefix-tree dictionary.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryTrie {
    root: TrieNode,
    word_count: usize,
}

impl DictionaryTrie {
    /// Build from a list of words.
    ///
    /// Words are trimmed and lowercased; empty or non-alphabetic entries are
    /// skipped.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut trie = Self::default();
        let mut skipped = 0usize;

        for word in words {
            let normalized = word.as_ref().trim().to_lowercase();
            if normalized.is_empty() || !normalized.chars().all(is_dictionary_letter) {
                skipped += 1;
                continue;
            }
            trie.insert(&normalized);
        }

        if skipped > 0 {
            debug!("Skipped {} dictionary entries that are not alphabetic words", skipped);
        }
        trie
    }

    /// Build from newline-separated text.
    pub fn from_word_list(text: &str) -> Self {
        Self::from_words(text.lines())
    }

    /// Deserialize from a tree-shaped record.
    pub fn load(record: &Value) -> Result<Self, DictionaryError> {
        let mut word_count = 0;
        let mut path = String::new();
        let root = parse_node(record, &mut path, &mut word_count)?;

        if root.is_end_of_word {
            return Err(DictionaryError::malformed("", "root node cannot end a word"));
        }

        Ok(Self { root, word_count })
    }

    /// Deserialize from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, DictionaryError> {
        let record: Value = serde_json::from_str(json)?;
        Self::load(&record)
    }

    /// Load a dictionary file: a JSON record, or a plain word list.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, DictionaryError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;

        let trie = if text.trim_start().starts_with('{') {
            Self::from_json_str(&text)?
        } else {
            Self::from_word_list(&text)
        };

        info!("Loaded {} words from {}", trie.len(), path.display());
        Ok(trie)
    }

    /// Check whether `word` is in the dictionary.
    ///
    /// Case-sensitive: callers lowercase first.
    pub fn exists(&self, word: &str) -> bool {
        if word.is_empty() {
            return false;
        }
        self.find(word).is_some_and(TrieNode::is_end_of_word)
    }

    /// Check whether any dictionary word starts with `prefix`.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.find(prefix).is_some()
    }

    /// Number of words.
    pub fn len(&self) -> usize {
        self.word_count
    }

    /// True if the dictionary holds no words.
    pub fn is_empty(&self) -> bool {
        self.word_count == 0
    }

    /// Root node.
    pub fn root(&self) -> &TrieNode {
        &self.root
    }

    /// Serialize to the tree-shaped record accepted by [`DictionaryTrie::load`].
    pub fn to_record(&self) -> Value {
        node_to_record(&self.root)
    }

    /// Serialize to a compact binary snapshot.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DictionaryError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize a binary snapshot, validating its shape.
    pub fn from_bytes(data: &[u8]) -> Result<Self, DictionaryError> {
        let trie: DictionaryTrie = bincode::deserialize(data)?;

        let mut counted = 0;
        let mut path = String::new();
        validate_node(&trie.root, &mut path, &mut counted)?;

        if trie.root.is_end_of_word {
            return Err(DictionaryError::malformed("", "root node cannot end a word"));
        }
        if counted != trie.word_count {
            return Err(DictionaryError::malformed(
                "",
                format!("snapshot claims {} words but holds {}", trie.word_count, counted),
            ));
        }

        Ok(trie)
    }

    fn insert(&mut self, word: &str) {
        let mut node = &mut self.root;
        for c in word.chars() {
            node = node.children.entry(c).or_default();
        }
        if !node.is_end_of_word {
            node.is_end_of_word = true;
            self.word_count += 1;
        }
    }

    fn find(&self, s: &str) -> Option<&TrieNode> {
        let mut node = &self.root;
        for c in s.chars() {
            node = node.children.get(&c)?;
        }
        Some(node)
    }
}

fn is_dictionary_letter(c: char) -> bool {
    c.is_alphabetic() && c.is_lowercase()
}

fn single_letter(key: &str) -> Option<char> {
    let mut chars = key.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    is_dictionary_letter(c).then_some(c)
}

fn parse_node(
    value: &Value,
    path: &mut String,
    word_count: &mut usize,
) -> Result<TrieNode, DictionaryError> {
    let object = value
        .as_object()
        .ok_or_else(|| DictionaryError::malformed(path.as_str(), "node is not an object"))?;

    let mut node = TrieNode::default();
    for (key, child) in object {
        if key == END_MARKER {
            node.is_end_of_word = child
                .as_bool()
                .ok_or_else(|| DictionaryError::malformed(path.as_str(), "end marker is not a boolean"))?;
            if node.is_end_of_word {
                *word_count += 1;
            }
            continue;
        }

        let letter = single_letter(key).ok_or_else(|| {
            DictionaryError::malformed(path.as_str(), format!("key {:?} is neither a letter nor the end marker", key))
        })?;

        path.push(letter);
        let parsed = parse_node(child, path, word_count)?;
        path.pop();

        node.children.insert(letter, parsed);
    }

    Ok(node)
}

fn validate_node(
    node: &TrieNode,
    path: &mut String,
    word_count: &mut usize,
) -> Result<(), DictionaryError> {
    if node.is_end_of_word {
        *word_count += 1;
    }
    for (letter, child) in &node.children {
        if !is_dictionary_letter(*letter) {
            return Err(DictionaryError::malformed(
                path,
                format!("child key {:?} is not a lowercase letter", letter),
            ));
        }
        path.push(*letter);
        validate_node(child, path, word_count)?;
        path.pop();
    }
    Ok(())
}

fn node_to_record(node: &TrieNode) -> Value {
    let mut object = Map::new();
    if node.is_end_of_word {
        object.insert(END_MARKER.to_string(), Value::Bool(true));
    }
    for (letter, child) in &node.children {
        object.insert(letter.to_string(), node_to_record(child));
    }
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn sample() -> DictionaryTrie {
        DictionaryTrie::from_words(["cat", "cats", "dog", "a"])
    }

    #[test]
    fn test_exists() {
        let trie = sample();
        assert!(trie.exists("cat"));
        assert!(trie.exists("cats"));
        assert!(trie.exists("dog"));
        assert!(trie.exists("a"));
        assert_eq!(trie.len(), 4);
    }

    #[test]
    fn test_prefix_is_not_a_word() {
        let trie = sample();
        assert!(!trie.exists("ca"));
        assert!(!trie.exists("do"));
        assert!(trie.has_prefix("ca"));
        assert!(!trie.has_prefix("x"));
    }

    #[test]
    fn test_miss_and_empty() {
        let trie = sample();
        assert!(!trie.exists("cow"));
        assert!(!trie.exists("catss"));
        assert!(!trie.exists(""));
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let trie = sample();
        assert!(!trie.exists("CAT"));
        assert!(!trie.exists("Cat"));
    }

    #[test]
    fn test_from_words_normalizes_and_skips() {
        let trie = DictionaryTrie::from_words(["  Hello ", "it's", "", "x1", "WORLD", "hello"]);
        assert!(trie.exists("hello"));
        assert!(trie.exists("world"));
        assert!(!trie.exists("it's"));
        // Duplicates count once
        assert_eq!(trie.len(), 2);
    }

    #[test]
    fn test_load_record() {
        let record = json!({
            "c": { "a": { "t": { "$": true, "s": { "$": true } } } },
            "o": { "x": { "$": true }, "$": false }
        });

        let trie = DictionaryTrie::load(&record).unwrap();
        assert!(trie.exists("cat"));
        assert!(trie.exists("cats"));
        assert!(trie.exists("ox"));
        assert!(!trie.exists("o"));
        assert_eq!(trie.len(), 3);
    }

    #[test]
    fn test_record_reload_preserves_words() {
        let trie = sample();
        let reloaded = DictionaryTrie::load(&trie.to_record()).unwrap();
        assert_eq!(reloaded, trie);
    }

    #[test]
    fn test_malformed_node_not_object() {
        let record = json!({ "a": ["b"] });
        let err = DictionaryTrie::load(&record).unwrap_err();
        match err {
            DictionaryError::MalformedDictionary { path, .. } => assert_eq!(path, "a"),
            other => panic!("Expected MalformedDictionary, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_keys() {
        for record in [
            json!({ "ab": { "$": true } }),
            json!({ "A": { "$": true } }),
            json!({ "1": { "$": true } }),
            json!({ "": { "$": true } }),
        ] {
            let result = DictionaryTrie::load(&record);
            assert!(
                matches!(result, Err(DictionaryError::MalformedDictionary { .. })),
                "record {} should be rejected",
                record
            );
        }
    }

    #[test]
    fn test_malformed_end_marker() {
        let record = json!({ "a": { "$": "yes" } });
        assert!(matches!(
            DictionaryTrie::load(&record),
            Err(DictionaryError::MalformedDictionary { .. })
        ));

        let root_word = json!({ "$": true, "a": { "$": true } });
        assert!(matches!(
            DictionaryTrie::load(&root_word),
            Err(DictionaryError::MalformedDictionary { .. })
        ));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(
            DictionaryTrie::from_json_str("{ not json"),
            Err(DictionaryError::Json(_))
        ));
    }

    #[test]
    fn test_binary_snapshot() {
        let trie = sample();
        let bytes = trie.to_bytes().unwrap();
        let restored = DictionaryTrie::from_bytes(&bytes).unwrap();
        assert!(restored.exists("cats"));
        assert_eq!(restored.len(), trie.len());
    }

    #[test]
    fn test_binary_snapshot_rejects_bad_letters() {
        let mut root = TrieNode::default();
        root.children.insert(
            'A',
            TrieNode {
                children: BTreeMap::new(),
                is_end_of_word: true,
            },
        );
        let bad = DictionaryTrie { root, word_count: 1 };
        let bytes = bincode::serialize(&bad).unwrap();

        assert!(matches!(
            DictionaryTrie::from_bytes(&bytes),
            Err(DictionaryError::MalformedDictionary { .. })
        ));
    }

    #[test]
    fn test_binary_snapshot_rejects_wrong_count() {
        let mut trie = sample();
        trie.word_count = 99;
        let bytes = bincode::serialize(&trie).unwrap();

        assert!(matches!(
            DictionaryTrie::from_bytes(&bytes),
            Err(DictionaryError::MalformedDictionary { .. })
        ));
    }

    #[test]
    fn test_load_file_word_list() {
        let path = std::env::temp_dir().join(format!("word-battle-dict-{}.txt", uuid::Uuid::new_v4()));
        std::fs::write(&path, "alpha\nbeta\ngamma\n").unwrap();

        let trie = DictionaryTrie::load_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(trie.len(), 3);
        assert!(trie.exists("beta"));
    }

    #[test]
    fn test_concurrent_reads() {
        let trie = Arc::new(sample());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let trie = Arc::clone(&trie);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        assert!(trie.exists("cats"));
                        assert!(!trie.exists("ca"));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
