//! Core deterministic primitives.
//!
//! Everything both clients of a match must agree on bit-for-bit starts here.

pub mod rng;
pub mod hash;

// Re-export core types
pub use rng::{DeterministicRng, derive_board_seed};
pub use hash::{BoardHash, BoardHasher};
