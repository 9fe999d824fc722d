//! Socket Abstractions
//!
//! The matchmaking and battle services are reached through these traits.
//! Every method returns once the request is queued; nothing here waits for
//! the server to acknowledge. Inbound traffic is pushed as typed events onto
//! a single-consumer queue owned by the state machine that needs it.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::game::board::WordPath;
use crate::game::results::SessionId;

// =============================================================================
// STATUS & ERRORS
// =============================================================================

/// Connection state of the matchmaking socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchmakingStatus {
    /// Never connected.
    NotConnected,
    /// Connect requested, not yet confirmed.
    Connecting,
    /// Connected to the matchmaking service.
    Connected,
    /// Connection closed after having been open.
    Disconnected,
}

/// Transport-level socket errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SocketError {
    /// The request could not be sent.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The socket is closed.
    #[error("Socket closed")]
    Closed,

    /// The message could not be encoded or decoded.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<serde_json::Error> for SocketError {
    fn from(e: serde_json::Error) -> Self {
        SocketError::Protocol(e.to_string())
    }
}

// =============================================================================
// EVENTS
// =============================================================================

/// Opponent as announced by the matchmaking service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpponentIdentity {
    /// Opponent's player ID.
    pub player_id: String,
    /// Opponent's display name.
    pub display_name: String,
}

/// A match was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchFoundEvent {
    /// Battle session to join.
    pub session_id: SessionId,
    /// Who we play against.
    pub opponent: OpponentIdentity,
    /// Opponent's rating as reported by matchmaking.
    pub opponent_rating: i32,
}

/// Inbound matchmaking traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchmakingEvent {
    /// The socket's connection state changed.
    StatusChanged(MatchmakingStatus),
    /// The service confirmed the player is queued.
    Searching,
    /// An opponent was found.
    MatchFound(MatchFoundEvent),
    /// The service gave up on the search.
    SearchFailed {
        /// Reason reported by the service or transport.
        reason: String,
    },
}

/// Inbound battle traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BattleEvent {
    /// The opponent traced a word.
    OpponentWordPath(WordPath),
    /// Match clock update.
    ClockTick {
        /// Time since the battle started.
        elapsed: Duration,
    },
    /// The match clock ran out.
    ClockExpired,
    /// The opponent's client ended the match.
    OpponentEnded,
    /// The opponent forfeited or dropped.
    OpponentLeft,
    /// Our own connection dropped.
    ConnectionLost {
        /// Transport detail.
        reason: String,
    },
}

/// Sending half given to a socket implementation.
pub type EventSender<E> = mpsc::UnboundedSender<E>;

/// Receiving half owned by a state machine.
pub type EventReceiver<E> = mpsc::UnboundedReceiver<E>;

/// Create a single-consumer event queue.
pub fn event_queue<E>() -> (EventSender<E>, EventReceiver<E>) {
    mpsc::unbounded_channel()
}

// =============================================================================
// TRAITS
// =============================================================================

/// Client side of the matchmaking service.
#[async_trait]
pub trait MatchmakingSocket: Send + Sync {
    /// Current connection state, or `None` if it cannot be determined.
    async fn status(&self) -> Option<MatchmakingStatus>;

    /// Open a connection as this player.
    async fn connect(&self, player_id: &str, display_name: &str) -> Result<(), SocketError>;

    /// Ask for an opponent near `rating`.
    async fn find_match(&self, rating: i32) -> Result<(), SocketError>;

    /// Leave the queue and close the connection.
    async fn disconnect(&self) -> Result<(), SocketError>;
}

/// Client side of a battle session.
#[async_trait]
pub trait BattleSocket: Send + Sync {
    /// Join the battle `session_id` as this player.
    async fn connect(
        &self,
        session_id: &SessionId,
        display_name: &str,
        player_id: &str,
    ) -> Result<(), SocketError>;

    /// Broadcast a traced path to the opponent.
    async fn send_word_path(&self, path: &WordPath) -> Result<(), SocketError>;

    /// Leave the battle.
    async fn leave_game(&self) -> Result<(), SocketError>;
}
