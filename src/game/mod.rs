//! Game Logic Module
//!
//! Pure, synchronous match logic. Nothing here touches the network.
//!
//! ## Module Structure
//!
//! - `trie`: Dictionary prefix tree and its record formats
//! - `board`: Letter board, tiles, traced paths, seeded generation
//! - `scorer`: Path scoring with letter/word multipliers
//! - `results`: Final match results and outcomes

pub mod trie;
pub mod board;
pub mod scorer;
pub mod results;

// Re-export key types
pub use trie::{DictionaryTrie, DictionaryError, TrieNode, END_MARKER};
pub use board::{Board, BoardConfig, BoardError, Coord, Score, Tile, WordPath};
pub use scorer::{BoardScorer, ScoredWord};
pub use results::{
    EndReason, GameResults, MatchOutcome, PlayerResult, SessionId, WordEntry, DRAW_MARKER,
};
