//! Board Fingerprinting
//!
//! Both clients of a match must hold byte-identical boards. Each side hashes
//! its board with [`BoardHasher`] and the fingerprints can be compared in logs
//! or over the wire.

use sha2::{Sha256, Digest};

/// Hash output type (256 bits / 32 bytes)
pub type BoardHash = [u8; 32];

/// Deterministic hasher for board contents.
///
/// Wraps SHA-256 with a domain separator. Order of updates is part of the
/// fingerprint.
pub struct BoardHasher {
    hasher: Sha256,
}

impl BoardHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for a letter board.
    pub fn for_board() -> Self {
        Self::new(b"WORD_BATTLE_BOARD_V1")
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a char (as its scalar value).
    #[inline]
    pub fn update_char(&mut self, value: char) {
        self.update_u32(value as u32);
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> BoardHash {
        self.hasher.finalize().into()
    }
}

// =============================================================================
// TESTS
// =============================================================================
