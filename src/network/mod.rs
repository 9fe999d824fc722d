//! Network Layer
//!
//! State machines that talk to the matchmaking and battle services, the
//! socket traits they talk through, and the WebSocket implementations.
//! Scoring and results live in `game/`; this layer only moves paths and
//! events around.

pub mod socket;
pub mod protocol;
pub mod matchmaking;
pub mod battle;
pub mod ws;

pub use socket::{
    event_queue, BattleEvent, BattleSocket, EventReceiver, EventSender, MatchFoundEvent,
    MatchmakingEvent, MatchmakingSocket, MatchmakingStatus, OpponentIdentity, SocketError,
};
pub use protocol::{BattleNotice, BattleRequest, MatchmakingNotice, MatchmakingRequest};
pub use matchmaking::{
    MatchedInfo, MatchmakingConfig, MatchmakingError, MatchmakingSession, MatchmakingUpdate,
    QueueState,
};
pub use battle::{BattleConfig, BattleError, BattleSession, BattleState, BattleUpdate};
pub use ws::{WsBattleSocket, WsMatchmakingSocket};
