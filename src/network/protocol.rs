//! Protocol Messages
//!
//! JSON wire format spoken with the matchmaking and battle services over
//! WebSocket. Every message is an internally tagged object (`"type"`).
//! Session IDs travel as hex strings.

use std::time::Duration;

use serde::{Serialize, Deserialize};

use crate::game::board::WordPath;
use crate::game::results::SessionId;
use super::socket::{BattleEvent, MatchFoundEvent, MatchmakingEvent, OpponentIdentity};

// =============================================================================
// MATCHMAKING
// =============================================================================

/// Client -> matchmaking service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchmakingRequest {
    /// Identify the connection.
    Hello {
        /// Player ID.
        player_id: String,
        /// Display name.
        display_name: String,
    },

    /// Join the queue.
    FindMatch {
        /// Rating to match against.
        rating: i32,
    },

    /// Leave the queue.
    CancelSearch,
}

/// Matchmaking service -> client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchmakingNotice {
    /// Queued; waiting for an opponent.
    Searching,

    /// Opponent found.
    MatchFound {
        /// Battle session ID (hex).
        session_id: String,
        /// Opponent's player ID.
        opponent_id: String,
        /// Opponent's display name.
        opponent_name: String,
        /// Opponent's rating.
        opponent_rating: i32,
    },

    /// The search was abandoned.
    SearchFailed {
        /// Why.
        reason: String,
    },
}

impl MatchmakingNotice {
    /// Convert to the event a [`MatchmakingSession`](super::matchmaking::MatchmakingSession) consumes.
    ///
    /// Returns `None` if the session ID is not 16 hex-encoded bytes.
    pub fn into_event(self) -> Option<MatchmakingEvent> {
        let event = match self {
            MatchmakingNotice::Searching => MatchmakingEvent::Searching,
            MatchmakingNotice::MatchFound {
                session_id,
                opponent_id,
                opponent_name,
                opponent_rating,
            } => MatchmakingEvent::MatchFound(MatchFoundEvent {
                session_id: parse_session_id(&session_id)?,
                opponent: OpponentIdentity {
                    player_id: opponent_id,
                    display_name: opponent_name,
                },
                opponent_rating,
            }),
            MatchmakingNotice::SearchFailed { reason } => MatchmakingEvent::SearchFailed { reason },
        };
        Some(event)
    }
}

// =============================================================================
// BATTLE
// =============================================================================

/// Client -> battle service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BattleRequest {
    /// Join a battle session.
    Join {
        /// Session ID (hex).
        session_id: String,
        /// Player ID.
        player_id: String,
        /// Display name.
        display_name: String,
    },

    /// A traced word. Points are never sent.
    WordPath {
        /// Cells in trace order.
        path: WordPath,
    },

    /// Forfeit and leave.
    LeaveGame,
}

/// Battle service -> client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BattleNotice {
    /// Opponent traced a word.
    OpponentWordPath {
        /// Cells in trace order.
        path: WordPath,
    },

    /// Match clock.
    ClockTick {
        /// Milliseconds since the battle started.
        elapsed_ms: u64,
    },

    /// Time is up.
    ClockExpired,

    /// The opponent's client ended the match.
    OpponentEnded,

    /// The opponent forfeited or disconnected.
    OpponentLeft,
}

impl From<BattleNotice> for BattleEvent {
    fn from(notice: BattleNotice) -> Self {
        match notice {
            BattleNotice::OpponentWordPath { path } => BattleEvent::OpponentWordPath(path),
            BattleNotice::ClockTick { elapsed_ms } => BattleEvent::ClockTick {
                elapsed: Duration::from_millis(elapsed_ms),
            },
            BattleNotice::ClockExpired => BattleEvent::ClockExpired,
            BattleNotice::OpponentEnded => BattleEvent::OpponentEnded,
            BattleNotice::OpponentLeft => BattleEvent::OpponentLeft,
        }
    }
}

/// Parse a hex session ID.
pub fn parse_session_id(hex_id: &str) -> Option<SessionId> {
    let bytes = hex::decode(hex_id).ok()?;
    bytes.try_into().ok()
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

macro_rules! json_codec {
    ($($ty:ty),*) => {
        $(
            impl $ty {
                /// Serialize to JSON string.
                pub fn to_json(&self) -> Result<String, serde_json::Error> {
                    serde_json::to_string(self)
                }

                /// Deserialize from JSON string.
                pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
                    serde_json::from_str(s)
                }
            }
        )*
    };
}

json_codec!(MatchmakingRequest, MatchmakingNotice, BattleRequest, BattleNotice);
