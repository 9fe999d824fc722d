//! Board Scoring
//!
//! Turns a traced [`WordPath`] into points:
//!
//! 1. Spell the path (cell letters, lowercased)
//! 2. Reject non-dictionary words with a score of 0
//! 3. Sum `base_value × letter_multiplier` over the cells
//! 4. Apply every word multiplier > 1 on the path, in path order
//!
//! Word multipliers stack: two double-word cells give ×4. Path geometry
//! (adjacency, cell reuse) is checked by the input surface, not here.

use std::sync::Arc;

use serde::{Serialize, Deserialize};
use tracing::debug;

use super::board::{Board, Score, WordPath};
use super::trie::DictionaryTrie;

/// A spelled word with its score.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredWord {
    /// Lowercased word spelled by the path (empty if unspellable).
    pub word: String,
    /// Points awarded, 0 for non-words.
    pub score: Score,
}

/// Stateless scorer over a shared dictionary.
///
/// Cloning is cheap; every clone reads the same trie.
#[derive(Clone, Debug)]
pub struct BoardScorer {
    dictionary: Arc<DictionaryTrie>,
}

impl BoardScorer {
    /// Create a scorer backed by `dictionary`.
    pub fn new(dictionary: Arc<DictionaryTrie>) -> Self {
        Self { dictionary }
    }

    /// The dictionary this scorer validates against.
    pub fn dictionary(&self) -> &Arc<DictionaryTrie> {
        &self.dictionary
    }

    /// Score `path` on `board`.
    pub fn evaluate(&self, path: &WordPath, board: &Board) -> Score {
        self.evaluate_word(path, board).score
    }

    /// Score `path` on `board`, keeping the spelled word.
    pub fn evaluate_word(&self, path: &WordPath, board: &Board) -> ScoredWord {
        let word = match spell(path, board) {
            Some(word) => word,
            None => {
                debug!(cells = path.len(), "Path leaves the board");
                return ScoredWord { word: String::new(), score: 0 };
            }
        };

        if word.is_empty() || !self.dictionary.exists(&word) {
            return ScoredWord { word, score: 0 };
        }

        let mut total: Score = 0;
        let mut word_multipliers = Vec::new();
        for coord in path.cells() {
            // spell() already resolved every cell
            if let Some(tile) = board.get(*coord) {
                total = total.saturating_add(tile.letter_score());
                if tile.word_multiplier > 1 {
                    word_multipliers.push(tile.word_multiplier);
                }
            }
        }

        for multiplier in word_multipliers {
            total = total.saturating_mul(multiplier);
        }

        ScoredWord { word, score: total }
    }
}

/// Spell `path` on `board`, lowercased.
///
/// Returns `None` if any cell is off the board.
pub fn spell(path: &WordPath, board: &Board) -> Option<String> {
    let mut word = String::with_capacity(path.len());
    for coord in path.cells() {
        let tile = board.get(*coord)?;
        word.extend(tile.letter.to_lowercase());
    }
    Some(word)
}

// =============================================================================
// TESTS
// =============================================================================
