//! In-memory collaborators.
//!
//! Stand-ins for the matchmaking service, battle service, profile store and
//! leaderboards. They record every request so tests can assert on exactly
//! what was sent, and they can be told to fail.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::game::board::WordPath;
use crate::game::results::SessionId;
use crate::network::socket::{
    event_queue, BattleEvent, BattleSocket, EventReceiver, EventSender, MatchmakingEvent,
    MatchmakingSocket, MatchmakingStatus, SocketError,
};
use crate::profile::{PlayerProfile, ProfileError, ProfileStore};
use crate::rating::store::{LeaderboardId, ScoreStore, ScoreStoreError};

// =============================================================================
// MATCHMAKING
// =============================================================================

/// A request received by [`MemoryMatchmakingSocket`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchmakingCall {
    /// `connect`
    Connect {
        /// Player ID sent.
        player_id: String,
        /// Display name sent.
        display_name: String,
    },
    /// `find_match`
    FindMatch {
        /// Rating sent.
        rating: i32,
    },
    /// `disconnect`
    Disconnect,
}

struct MatchmakingInner {
    status: Option<MatchmakingStatus>,
    calls: Vec<MatchmakingCall>,
    find_match_error: Option<String>,
}

/// Matchmaking socket that connects instantly and never finds a match on
/// its own; use [`MemoryMatchmakingSocket::announce`] to deliver one.
pub struct MemoryMatchmakingSocket {
    inner: Mutex<MatchmakingInner>,
    events: EventSender<MatchmakingEvent>,
}

impl MemoryMatchmakingSocket {
    /// Create with an initial status (`None` = status unavailable).
    pub fn new(status: Option<MatchmakingStatus>) -> (Self, EventReceiver<MatchmakingEvent>) {
        let (events, rx) = event_queue();
        let socket = Self {
            inner: Mutex::new(MatchmakingInner {
                status,
                calls: Vec::new(),
                find_match_error: None,
            }),
            events,
        };
        (socket, rx)
    }

    /// Requests received so far.
    pub fn calls(&self) -> Vec<MatchmakingCall> {
        self.inner.lock().calls.clone()
    }

    /// Override the reported status.
    pub fn set_status(&self, status: Option<MatchmakingStatus>) {
        self.inner.lock().status = status;
    }

    /// Make every `find_match` fail with `reason`.
    pub fn fail_find_match(&self, reason: &str) {
        self.inner.lock().find_match_error = Some(reason.to_string());
    }

    /// Deliver an event as if the service sent it.
    pub fn announce(&self, event: MatchmakingEvent) {
        let _ = self.events.send(event);
    }

    fn transition(&self, status: MatchmakingStatus) {
        self.inner.lock().status = Some(status);
        let _ = self.events.send(MatchmakingEvent::StatusChanged(status));
    }
}

#[async_trait]
impl MatchmakingSocket for MemoryMatchmakingSocket {
    async fn status(&self) -> Option<MatchmakingStatus> {
        self.inner.lock().status
    }

    async fn connect(&self, player_id: &str, display_name: &str) -> Result<(), SocketError> {
        self.inner.lock().calls.push(MatchmakingCall::Connect {
            player_id: player_id.to_string(),
            display_name: display_name.to_string(),
        });
        self.transition(MatchmakingStatus::Connected);
        Ok(())
    }

    async fn find_match(&self, rating: i32) -> Result<(), SocketError> {
        let mut inner = self.inner.lock();
        inner.calls.push(MatchmakingCall::FindMatch { rating });
        match &inner.find_match_error {
            Some(reason) => Err(SocketError::Transport(reason.clone())),
            None => Ok(()),
        }
    }

    async fn disconnect(&self) -> Result<(), SocketError> {
        self.inner.lock().calls.push(MatchmakingCall::Disconnect);
        self.transition(MatchmakingStatus::Disconnected);
        Ok(())
    }
}

// =============================================================================
// BATTLE
// =============================================================================

/// A request received by [`MemoryBattleSocket`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BattleCall {
    /// `connect`
    Connect {
        /// Session joined.
        session_id: SessionId,
        /// Display name sent.
        display_name: String,
        /// Player ID sent.
        player_id: String,
    },
    /// `send_word_path`
    SendWordPath(WordPath),
    /// `leave_game`
    LeaveGame,
}

#[derive(Default)]
struct BattleInner {
    calls: Vec<BattleCall>,
    fail_connect: bool,
    fail_sends: bool,
}

/// Battle socket. Paired sockets forward paths and departures to each other.
pub struct MemoryBattleSocket {
    inner: Mutex<BattleInner>,
    events: EventSender<BattleEvent>,
    peer: Option<EventSender<BattleEvent>>,
}

impl MemoryBattleSocket {
    /// Standalone socket with nobody on the other end.
    pub fn new() -> (Self, EventReceiver<BattleEvent>) {
        let (events, rx) = event_queue();
        let socket = Self {
            inner: Mutex::new(BattleInner::default()),
            events,
            peer: None,
        };
        (socket, rx)
    }

    /// Two sockets wired to each other, one per client.
    #[allow(clippy::type_complexity)]
    pub fn pair() -> (
        (Self, EventReceiver<BattleEvent>),
        (Self, EventReceiver<BattleEvent>),
    ) {
        let (a_events, a_rx) = event_queue();
        let (b_events, b_rx) = event_queue();

        let a = Self {
            inner: Mutex::new(BattleInner::default()),
            events: a_events.clone(),
            peer: Some(b_events.clone()),
        };
        let b = Self {
            inner: Mutex::new(BattleInner::default()),
            events: b_events,
            peer: Some(a_events),
        };
        ((a, a_rx), (b, b_rx))
    }

    /// Requests received so far.
    pub fn calls(&self) -> Vec<BattleCall> {
        self.inner.lock().calls.clone()
    }

    /// Make `connect` fail.
    pub fn fail_connect(&self, fail: bool) {
        self.inner.lock().fail_connect = fail;
    }

    /// Make `send_word_path` and `leave_game` fail.
    pub fn fail_sends(&self, fail: bool) {
        self.inner.lock().fail_sends = fail;
    }

    /// Deliver an event to this socket's owner (clock ticks, expiry).
    pub fn deliver(&self, event: BattleEvent) {
        let _ = self.events.send(event);
    }

    fn forward(&self, event: BattleEvent) {
        if let Some(peer) = &self.peer {
            let _ = peer.send(event);
        }
    }
}

#[async_trait]
impl BattleSocket for MemoryBattleSocket {
    async fn connect(
        &self,
        session_id: &SessionId,
        display_name: &str,
        player_id: &str,
    ) -> Result<(), SocketError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BattleCall::Connect {
            session_id: *session_id,
            display_name: display_name.to_string(),
            player_id: player_id.to_string(),
        });
        if inner.fail_connect {
            return Err(SocketError::Transport("battle service unreachable".to_string()));
        }
        Ok(())
    }

    async fn send_word_path(&self, path: &WordPath) -> Result<(), SocketError> {
        {
            let mut inner = self.inner.lock();
            inner.calls.push(BattleCall::SendWordPath(path.clone()));
            if inner.fail_sends {
                return Err(SocketError::Closed);
            }
        }
        self.forward(BattleEvent::OpponentWordPath(path.clone()));
        Ok(())
    }

    async fn leave_game(&self) -> Result<(), SocketError> {
        {
            let mut inner = self.inner.lock();
            inner.calls.push(BattleCall::LeaveGame);
            if inner.fail_sends {
                return Err(SocketError::Closed);
            }
        }
        self.forward(BattleEvent::OpponentLeft);
        Ok(())
    }
}

// =============================================================================
// PROFILES
// =============================================================================

/// Profile store backed by a map.
pub struct MemoryProfileStore {
    local: PlayerProfile,
    profiles: Mutex<HashMap<String, PlayerProfile>>,
    failing: Mutex<bool>,
}

impl MemoryProfileStore {
    /// Create with the signed-in player.
    pub fn new(local: PlayerProfile) -> Self {
        Self {
            local,
            profiles: Mutex::new(HashMap::new()),
            failing: Mutex::new(false),
        }
    }

    /// Store a profile.
    pub fn insert(&self, profile: PlayerProfile) {
        self.profiles.lock().insert(profile.player_id.clone(), profile);
    }

    /// Make every lookup fail.
    pub fn fail_lookups(&self, fail: bool) {
        *self.failing.lock() = fail;
    }

    fn check(&self) -> Result<(), ProfileError> {
        if *self.failing.lock() {
            return Err(ProfileError::Lookup("profile store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn fetch_local_identity(&self) -> Result<PlayerProfile, ProfileError> {
        self.check()?;
        Ok(self.local.clone())
    }

    async fn fetch_profile(&self, player_id: &str) -> Result<PlayerProfile, ProfileError> {
        self.check()?;
        self.profiles
            .lock()
            .get(player_id)
            .cloned()
            .ok_or_else(|| ProfileError::NotFound(player_id.to_string()))
    }
}

// =============================================================================
// LEADERBOARDS
// =============================================================================

/// A submission received by [`MemoryScoreStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    /// Leaderboard written.
    pub leaderboard: LeaderboardId,
    /// Score sent.
    pub score: i64,
    /// Context value sent.
    pub context: i64,
    /// False if the store rejected it.
    pub accepted: bool,
}

/// Score store that keeps the latest value per leaderboard.
#[derive(Default)]
pub struct MemoryScoreStore {
    submissions: Mutex<Vec<Submission>>,
    failing: Mutex<HashSet<LeaderboardId>>,
}

impl MemoryScoreStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every submission attempt, including failed ones.
    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().clone()
    }

    /// Latest accepted score on `leaderboard`.
    pub fn latest(&self, leaderboard: LeaderboardId) -> Option<i64> {
        self.submissions
            .lock()
            .iter()
            .rev()
            .find(|s| s.leaderboard == leaderboard && s.accepted)
            .map(|s| s.score)
    }

    /// Make submissions to `leaderboard` fail (or succeed again).
    pub fn set_failing(&self, leaderboard: LeaderboardId, fail: bool) {
        let mut failing = self.failing.lock();
        if fail {
            failing.insert(leaderboard);
        } else {
            failing.remove(&leaderboard);
        }
    }
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn submit_score(
        &self,
        score: i64,
        leaderboard: LeaderboardId,
        context: i64,
    ) -> Result<(), ScoreStoreError> {
        let accepted = !self.failing.lock().contains(&leaderboard);
        self.submissions.lock().push(Submission {
            leaderboard,
            score,
            context,
            accepted,
        });
        if !accepted {
            return Err(ScoreStoreError::Rejected {
                leaderboard,
                reason: "leaderboard unavailable".to_string(),
            });
        }
        Ok(())
    }
}
