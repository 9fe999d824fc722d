//! Match Results
//!
//! Immutable record of a finished battle: who won, each player's final
//! score and the words they found.

use std::time::Duration;

use serde::{Serialize, Deserialize};

use super::board::{Score, WordPath};

/// Unique session identifier.
pub type SessionId = [u8; 16];

/// Stored in `winner_identity` when the scores tie.
pub const DRAW_MARKER: &str = "<draw>";

/// One scored word in a player's history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordEntry {
    /// Lowercased word.
    pub word: String,
    /// Path that spelled it.
    pub path: WordPath,
    /// Match clock when it was scored.
    pub elapsed: Duration,
    /// Points awarded (0 for non-words and repeats).
    pub score: Score,
}

/// Final line for one player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerResult {
    /// Display name.
    pub player_name: String,
    /// Rating before the stake was deducted.
    pub rating_at_match_start: i32,
    /// Sum of word scores.
    pub final_score: Score,
    /// Every submission, in order.
    pub word_history: Vec<WordEntry>,
}

/// Why the battle ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The match clock ran out.
    ClockExpired,
    /// The opponent's client reported the end of the match.
    OpponentEnded,
    /// The local player forfeited.
    Forfeit,
    /// The opponent forfeited or dropped.
    OpponentLeft,
}

/// Outcome from one player's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    /// Won the match.
    Win,
    /// Tied.
    Draw,
    /// Lost the match.
    Loss,
}

/// Results of a finished battle.
///
/// `winner_identity` is for display only: names are not unique, so every
/// decision goes through `local_outcome` and the fixed player order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResults {
    /// Session these results belong to.
    pub session_id: SessionId,
    /// Winner's display name, or [`DRAW_MARKER`].
    pub winner_identity: String,
    /// Outcome for the local player.
    pub local_outcome: MatchOutcome,
    /// Local player first, opponent second.
    pub player_results: Vec<PlayerResult>,
    /// What ended the match.
    pub end_reason: EndReason,
}

impl GameResults {
    /// Build results, picking the winner by score.
    ///
    /// Higher score wins; equal scores are a draw.
    pub fn by_score(
        session_id: SessionId,
        local: PlayerResult,
        opponent: PlayerResult,
        end_reason: EndReason,
    ) -> Self {
        let local_outcome = match local.final_score.cmp(&opponent.final_score) {
            std::cmp::Ordering::Greater => MatchOutcome::Win,
            std::cmp::Ordering::Less => MatchOutcome::Loss,
            std::cmp::Ordering::Equal => MatchOutcome::Draw,
        };
        Self::build(session_id, local, opponent, local_outcome, end_reason)
    }

    /// Build results with a fixed winner (forfeits).
    pub fn with_winner(
        session_id: SessionId,
        local: PlayerResult,
        opponent: PlayerResult,
        local_wins: bool,
        end_reason: EndReason,
    ) -> Self {
        let local_outcome = if local_wins {
            MatchOutcome::Win
        } else {
            MatchOutcome::Loss
        };
        Self::build(session_id, local, opponent, local_outcome, end_reason)
    }

    fn build(
        session_id: SessionId,
        local: PlayerResult,
        opponent: PlayerResult,
        local_outcome: MatchOutcome,
        end_reason: EndReason,
    ) -> Self {
        let winner_identity = match local_outcome {
            MatchOutcome::Win => local.player_name.clone(),
            MatchOutcome::Loss => opponent.player_name.clone(),
            MatchOutcome::Draw => DRAW_MARKER.to_string(),
        };

        Self {
            session_id,
            winner_identity,
            local_outcome,
            player_results: vec![local, opponent],
            end_reason,
        }
    }

    /// True if the match was a draw.
    pub fn is_draw(&self) -> bool {
        self.local_outcome == MatchOutcome::Draw
    }

    /// Local player's result line.
    pub fn local(&self) -> Option<&PlayerResult> {
        self.player_results.first()
    }

    /// Opponent's result line.
    pub fn opponent(&self) -> Option<&PlayerResult> {
        self.player_results.get(1)
    }

    /// Outcome for the opponent.
    pub fn opponent_outcome(&self) -> MatchOutcome {
        match self.local_outcome {
            MatchOutcome::Win => MatchOutcome::Loss,
            MatchOutcome::Draw => MatchOutcome::Draw,
            MatchOutcome::Loss => MatchOutcome::Win,
        }
    }
}
