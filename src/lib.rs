//! # Word Battle
//!
//! Competitive-match core for a two-player word-finding game: matchmaking by
//! rating, a timed battle on a shared letter board, dictionary-checked
//! scoring, and rating/leaderboard settlement.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        WORD BATTLE                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/             - Deterministic primitives                │
//! │  ├── rng.rs        - Xorshift128+ PRNG, board seed           │
//! │  └── hash.rs       - Board fingerprints                      │
//! │                                                              │
//! │  game/             - Match logic (pure)                      │
//! │  ├── trie.rs       - Dictionary prefix tree                  │
//! │  ├── board.rs      - Tiles, paths, board generation          │
//! │  ├── scorer.rs     - Letter/word multiplier scoring          │
//! │  └── results.rs    - Final results and outcomes              │
//! │                                                              │
//! │  network/          - Talking to the services                 │
//! │  ├── socket.rs     - Socket traits and events                │
//! │  ├── protocol.rs   - JSON wire messages                      │
//! │  ├── matchmaking.rs- Queue state machine                     │
//! │  ├── battle.rs     - Live battle state machine               │
//! │  └── ws.rs         - WebSocket sockets                       │
//! │                                                              │
//! │  rating/           - Stakes and leaderboards                 │
//! │  ├── store.rs      - Leaderboard store trait                 │
//! │  └── reconciler.rs - Stake deduction and settlement          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Match Flow
//!
//! ```text
//! MatchmakingSession ──Matched──▶ RatingReconciler::on_matched   (rating -= stake)
//!         │
//!         └──────────────────────▶ BattleSession::on_match_found
//!                                     │  submit_word / opponent paths
//!                                     ▼
//!                                  GameResults ──▶ RatingReconciler::on_ended
//! ```
//!
//! Both clients derive the board from the session ID and the sorted player
//! IDs, so only word paths ever cross the wire.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;
pub mod rating;
pub mod profile;
pub mod cache;
pub mod config;
pub mod memory;

// Re-export commonly used types
pub use core::rng::{DeterministicRng, derive_board_seed};
pub use game::{
    Board, BoardScorer, DictionaryTrie, GameResults, Score, SessionId, Tile, WordPath, DRAW_MARKER,
};
pub use network::{BattleSession, MatchFoundEvent, MatchmakingSession};
pub use rating::RatingReconciler;
pub use profile::PlayerProfile;
pub use config::CoreConfig;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
