//! Letter Board
//!
//! Immutable grid of scored tiles plus the coordinate paths players trace
//! across it. Boards are generated from the session seed so both clients
//! build the same grid without sending it.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::hash::{BoardHash, BoardHasher};
use crate::core::rng::{DeterministicRng, derive_board_seed};

/// A word score. Never negative.
pub type Score = u32;

/// English letter frequencies (percentages * 100 for integer weights).
const LETTER_WEIGHTS: [(char, u32); 26] = [
    ('A', 820),
    ('B', 150),
    ('C', 280),
    ('D', 430),
    ('E', 1270),
    ('F', 220),
    ('G', 200),
    ('H', 610),
    ('I', 700),
    ('J', 15),
    ('K', 80),
    ('L', 400),
    ('M', 240),
    ('N', 670),
    ('O', 750),
    ('P', 190),
    ('Q', 10),
    ('R', 600),
    ('S', 630),
    ('T', 910),
    ('U', 280),
    ('V', 100),
    ('W', 240),
    ('X', 15),
    ('Y', 200),
    ('Z', 7),
];

/// Base point value per letter, rarer letters worth more.
const LETTER_VALUES: [u32; 26] = [
    1, 3, 3, 2, 1, 4, 2, 4, 1, 8, 5, 1, 3, 1, 1, 3, 10, 1, 1, 1, 1, 4, 4, 8, 4, 10,
];

const VOWELS: [char; 5] = ['A', 'E', 'I', 'O', 'U'];

/// Base value of an uppercase ASCII letter, 0 for anything else.
pub fn letter_value(letter: char) -> u32 {
    let upper = letter.to_ascii_uppercase();
    if upper.is_ascii_uppercase() {
        LETTER_VALUES[(upper as u8 - b'A') as usize]
    } else {
        0
    }
}

/// A single board cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    /// Letter shown on the tile.
    pub letter: char,
    /// Points before multipliers.
    pub base_value: u32,
    /// Multiplies this tile's value (1 = none).
    pub letter_multiplier: u32,
    /// Multiplies the whole word's value (1 = none).
    pub word_multiplier: u32,
}

impl Tile {
    /// Plain tile with no multipliers.
    pub fn new(letter: char, base_value: u32) -> Self {
        Self {
            letter,
            base_value,
            letter_multiplier: 1,
            word_multiplier: 1,
        }
    }

    /// Tile valued by the standard letter table.
    pub fn standard(letter: char) -> Self {
        Self::new(letter, letter_value(letter))
    }

    /// Set the letter multiplier (clamped to at least 1).
    pub fn with_letter_multiplier(mut self, multiplier: u32) -> Self {
        self.letter_multiplier = multiplier.max(1);
        self
    }

    /// Set the word multiplier (clamped to at least 1).
    pub fn with_word_multiplier(mut self, multiplier: u32) -> Self {
        self.word_multiplier = multiplier.max(1);
        self
    }

    /// `base_value × letter_multiplier`.
    #[inline]
    pub fn letter_score(&self) -> Score {
        self.base_value.saturating_mul(self.letter_multiplier)
    }
}

/// Grid coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    /// Row index.
    pub row: usize,
    /// Column index.
    pub col: usize,
}

impl Coord {
    /// Create a coordinate.
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl From<(usize, usize)> for Coord {
    fn from((row, col): (usize, usize)) -> Self {
        Self { row, col }
    }
}

/// Ordered cells traced by a player for one word.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WordPath(Vec<Coord>);

impl WordPath {
    /// Create from coordinates.
    pub fn new(cells: Vec<Coord>) -> Self {
        Self(cells)
    }

    /// Cells in trace order.
    pub fn cells(&self) -> &[Coord] {
        &self.0
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no cells were traced.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<(usize, usize)>> for WordPath {
    fn from(cells: Vec<(usize, usize)>) -> Self {
        Self(cells.into_iter().map(Coord::from).collect())
    }
}

impl FromIterator<Coord> for WordPath {
    fn from_iter<I: IntoIterator<Item = Coord>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Board construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    /// No rows or no columns.
    #[error("board has no tiles")]
    Empty,

    /// Rows of different lengths.
    #[error("row {row} has {found} tiles, expected {expected}")]
    RaggedRow {
        /// Offending row.
        row: usize,
        /// Width of the first row.
        expected: usize,
        /// Width of this row.
        found: usize,
    },

    /// A multiplier of zero would wipe out the score.
    #[error("tile at ({row}, {col}) has a zero multiplier")]
    ZeroMultiplier {
        /// Row of the tile.
        row: usize,
        /// Column of the tile.
        col: usize,
    },
}

/// Board generation parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
    /// Minimum vowels on the board; consonants are swapped out until met.
    pub min_vowels: usize,
    /// Tiles with a 2× letter multiplier.
    pub double_letter_cells: usize,
    /// Tiles with a 3× letter multiplier.
    pub triple_letter_cells: usize,
    /// Tiles with a 2× word multiplier.
    pub double_word_cells: usize,
    /// Tiles with a 3× word multiplier.
    pub triple_word_cells: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            rows: 4,
            cols: 4,
            min_vowels: 4,
            double_letter_cells: 2,
            triple_letter_cells: 1,
            double_word_cells: 1,
            triple_word_cells: 1,
        }
    }
}

/// Immutable letter grid, stored row-major.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    rows: usize,
    cols: usize,
    tiles: Vec<Tile>,
}

impl Board {
    /// Build from explicit rows of tiles.
    pub fn from_rows(rows: Vec<Vec<Tile>>) -> Result<Self, BoardError> {
        let height = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if height == 0 || width == 0 {
            return Err(BoardError::Empty);
        }

        let mut tiles = Vec::with_capacity(height * width);
        for (r, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(BoardError::RaggedRow {
                    row: r,
                    expected: width,
                    found: row.len(),
                });
            }
            for (c, tile) in row.into_iter().enumerate() {
                if tile.letter_multiplier == 0 || tile.word_multiplier == 0 {
                    return Err(BoardError::ZeroMultiplier { row: r, col: c });
                }
                tiles.push(tile);
            }
        }

        Ok(Self {
            rows: height,
            cols: width,
            tiles,
        })
    }

    /// Generate a board from a seed.
    ///
    /// Same seed and config always give the same board.
    pub fn generate(seed: u64, config: &BoardConfig) -> Self {
        let mut rng = DeterministicRng::new(seed);
        let cell_count = config.rows * config.cols;
        let min_vowels = config.min_vowels.min(cell_count);
        let weights: Vec<u32> = LETTER_WEIGHTS.iter().map(|(_, w)| *w).collect();

        let mut letters: Vec<char> = (0..cell_count)
            .map(|_| {
                let idx = rng.next_weighted(&weights).unwrap_or(0);
                LETTER_WEIGHTS[idx].0
            })
            .collect();

        // Top up vowels by swapping out randomly chosen consonants
        let vowels = letters.iter().filter(|c| VOWELS.contains(c)).count();
        if vowels < min_vowels {
            let vowel_weights: Vec<u32> = LETTER_WEIGHTS
                .iter()
                .map(|(c, w)| if VOWELS.contains(c) { *w } else { 0 })
                .collect();
            let mut consonants: Vec<usize> = (0..cell_count)
                .filter(|&idx| !VOWELS.contains(&letters[idx]))
                .collect();
            rng.shuffle(&mut consonants);
            for idx in consonants.into_iter().take(min_vowels - vowels) {
                let pick = rng.next_weighted(&vowel_weights).unwrap_or(0);
                letters[idx] = LETTER_WEIGHTS[pick].0;
            }
        }

        let mut tiles: Vec<Tile> = letters.into_iter().map(Tile::standard).collect();

        // Multiplier cells never overlap
        let mut slots: Vec<usize> = (0..cell_count).collect();
        rng.shuffle(&mut slots);
        let mut slots = slots.into_iter();

        for _ in 0..config.double_letter_cells {
            if let Some(idx) = slots.next() {
                tiles[idx].letter_multiplier = 2;
            }
        }
        for _ in 0..config.triple_letter_cells {
            if let Some(idx) = slots.next() {
                tiles[idx].letter_multiplier = 3;
            }
        }
        for _ in 0..config.double_word_cells {
            if let Some(idx) = slots.next() {
                tiles[idx].word_multiplier = 2;
            }
        }
        for _ in 0..config.triple_word_cells {
            if let Some(idx) = slots.next() {
                tiles[idx].word_multiplier = 3;
            }
        }

        Self {
            rows: config.rows,
            cols: config.cols,
            tiles,
        }
    }

    /// Generate the board both players of a session share.
    pub fn for_session(session_id: &[u8; 16], player_ids: &[&str], config: &BoardConfig) -> Self {
        Self::generate(derive_board_seed(session_id, player_ids), config)
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Tile at `coord`, or `None` if out of bounds.
    pub fn get(&self, coord: Coord) -> Option<&Tile> {
        if coord.row >= self.rows || coord.col >= self.cols {
            return None;
        }
        self.tiles.get(coord.row * self.cols + coord.col)
    }

    /// Iterate tiles with their coordinates, row-major.
    pub fn tiles(&self) -> impl Iterator<Item = (Coord, &Tile)> {
        let cols = self.cols.max(1);
        self.tiles
            .iter()
            .enumerate()
            .map(move |(idx, tile)| (Coord::new(idx / cols, idx % cols), tile))
    }

    /// Letters row by row, for logs.
    pub fn letter_rows(&self) -> Vec<String> {
        self.tiles
            .chunks(self.cols.max(1))
            .map(|row| row.iter().map(|t| t.letter).collect())
            .collect()
    }

    /// SHA-256 fingerprint of the full board contents.
    pub fn fingerprint(&self) -> BoardHash {
        let mut hasher = BoardHasher::for_board();
        hasher.update_u32(self.rows as u32);
        hasher.update_u32(self.cols as u32);
        for tile in &self.tiles {
            hasher.update_char(tile.letter);
            hasher.update_u32(tile.base_value);
            hasher.update_u32(tile.letter_multiplier);
            hasher.update_u32(tile.word_multiplier);
        }
        hasher.finalize()
    }
}
