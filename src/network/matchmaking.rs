//! Matchmaking Session
//!
//! Client-side state machine for getting into a match:
//!
//! ```text
//! Idle ──join_queue──▶ Searching ──match found──▶ Matched
//!  ▲                      │                          │
//!  ├──── leave_queue ─────┤                          │
//!  │                      └──failure──▶ Failed(reason)
//!  └──────────── socket disconnected ────────────────┘
//! ```
//!
//! Only a running search blocks `join_queue`; a session that is `Matched`
//! or `Failed` can queue again for the next match.
//!
//! The socket's connection status is mirrored from `StatusChanged` events;
//! joins and leaves re-check it with the socket before issuing any request.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn, debug, instrument};

use crate::cache::TypedCache;
use crate::game::results::SessionId;
use crate::profile::{PlayerProfile, ProfileError, ProfileStore};
use super::socket::{
    BattleSocket, EventReceiver, MatchFoundEvent, MatchmakingEvent, MatchmakingSocket,
    MatchmakingStatus, SocketError,
};

/// Matchmaking configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchmakingConfig {
    /// Pause between "match found" and opening the battle socket.
    pub match_found_delay: Duration,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            match_found_delay: Duration::from_millis(300),
        }
    }
}

/// Where the local player is in the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueState {
    /// Not queued.
    Idle,
    /// Waiting for an opponent.
    Searching,
    /// Opponent found and battle socket opened.
    Matched,
    /// The search ended with an error.
    Failed(String),
}

/// Everything a battle needs to know about a fresh match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedInfo {
    /// Battle session ID.
    pub session_id: SessionId,
    /// Local player.
    pub local: PlayerProfile,
    /// Local rating when the search started.
    pub local_rating: i32,
    /// Opponent profile (placeholder if the lookup failed).
    pub opponent: PlayerProfile,
    /// Opponent rating from the match-found event.
    pub opponent_rating: i32,
}

/// Result of applying one matchmaking event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchmakingUpdate {
    /// Socket status changed.
    Status(MatchmakingStatus),
    /// Match found and battle socket opened.
    Matched(MatchedInfo),
    /// The search ended without a match.
    SearchEnded {
        /// Why.
        reason: String,
    },
    /// Event did not apply in the current state.
    Ignored,
}

/// Matchmaking errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchmakingError {
    /// The socket could not report its status.
    #[error("Matchmaking status unavailable")]
    StatusUnavailable,

    /// A search is already running.
    #[error("Matchmaking unavailable in the current state")]
    MatchmakingUnavailable,

    /// Leave requested while not connected.
    #[error("Not connected to matchmaking")]
    Disconnected,

    /// Local identity lookup failed.
    #[error("Identity error: {0}")]
    Identity(#[from] ProfileError),

    /// Socket request failed.
    #[error("Transport error: {0}")]
    Transport(#[from] SocketError),
}

/// Client-side matchmaking state machine.
pub struct MatchmakingSession {
    config: MatchmakingConfig,
    socket: Arc<dyn MatchmakingSocket>,
    battle_socket: Arc<dyn BattleSocket>,
    profiles: Arc<dyn ProfileStore>,
    events: EventReceiver<MatchmakingEvent>,
    opponents: Arc<TypedCache<String, PlayerProfile>>,
    status: Option<MatchmakingStatus>,
    queue: QueueState,
    local: Option<PlayerProfile>,
    rating: i32,
}

impl MatchmakingSession {
    /// Create a session. `events` must be fed by `socket`.
    pub fn new(
        config: MatchmakingConfig,
        socket: Arc<dyn MatchmakingSocket>,
        battle_socket: Arc<dyn BattleSocket>,
        profiles: Arc<dyn ProfileStore>,
        events: EventReceiver<MatchmakingEvent>,
    ) -> Self {
        Self {
            config,
            socket,
            battle_socket,
            profiles,
            events,
            opponents: Arc::new(TypedCache::new()),
            status: None,
            queue: QueueState::Idle,
            local: None,
            rating: 0,
        }
    }

    /// Share an opponent profile cache with other sessions.
    pub fn with_profile_cache(mut self, cache: Arc<TypedCache<String, PlayerProfile>>) -> Self {
        self.opponents = cache;
        self
    }

    /// Queue state.
    pub fn queue_state(&self) -> &QueueState {
        &self.queue
    }

    /// Last status seen from the socket.
    pub fn status(&self) -> Option<MatchmakingStatus> {
        self.status
    }

    /// Opponent profiles seen so far.
    pub fn profile_cache(&self) -> &Arc<TypedCache<String, PlayerProfile>> {
        &self.opponents
    }

    /// Join the queue at `rating`.
    ///
    /// Connects first if the socket is not connected. Fails without touching
    /// the socket when the status is unknown or a search is already running.
    /// Joining from `Matched` starts the search for the next match.
    #[instrument(skip(self))]
    pub async fn join_queue(&mut self, rating: i32) -> Result<(), MatchmakingError> {
        let status = self
            .socket
            .status()
            .await
            .ok_or(MatchmakingError::StatusUnavailable)?;
        self.status = Some(status);

        if self.queue == QueueState::Searching {
            warn!("Join requested while {:?}", self.queue);
            return Err(MatchmakingError::MatchmakingUnavailable);
        }

        let local = match self.profiles.fetch_local_identity().await {
            Ok(profile) => profile,
            Err(e) => {
                self.queue = QueueState::Failed(format!("identity lookup failed: {}", e));
                return Err(e.into());
            }
        };

        if let Err(e) = self.request_match(status, &local, rating).await {
            warn!("Join failed: {}", e);
            self.queue = QueueState::Failed(e.to_string());
            return Err(e.into());
        }

        info!("Searching for a match at rating {}", rating);
        self.local = Some(local);
        self.rating = rating;
        self.queue = QueueState::Searching;
        Ok(())
    }

    async fn request_match(
        &self,
        status: MatchmakingStatus,
        local: &PlayerProfile,
        rating: i32,
    ) -> Result<(), SocketError> {
        match status {
            MatchmakingStatus::NotConnected | MatchmakingStatus::Disconnected => {
                debug!("Connecting as {}", local.display_name);
                self.socket.connect(&local.player_id, &local.display_name).await?;
                self.socket.find_match(rating).await
            }
            MatchmakingStatus::Connecting | MatchmakingStatus::Connected => {
                self.socket.find_match(rating).await
            }
        }
    }

    /// Leave the queue.
    ///
    /// Local state is `Idle` before the disconnect request goes out.
    #[instrument(skip(self))]
    pub async fn leave_queue(&mut self) -> Result<(), MatchmakingError> {
        let status = self
            .socket
            .status()
            .await
            .ok_or(MatchmakingError::StatusUnavailable)?;
        self.status = Some(status);

        match status {
            MatchmakingStatus::NotConnected | MatchmakingStatus::Disconnected => {
                Err(MatchmakingError::Disconnected)
            }
            MatchmakingStatus::Connecting | MatchmakingStatus::Connected => {
                self.queue = QueueState::Idle;
                if let Err(e) = self.socket.disconnect().await {
                    warn!("Disconnect request failed: {}", e);
                }
                info!("Left matchmaking queue");
                Ok(())
            }
        }
    }

    /// Wait for the next event and apply it.
    ///
    /// Returns `None` once the socket side of the queue is gone.
    pub async fn process_next(&mut self) -> Option<MatchmakingUpdate> {
        let event = self.events.recv().await?;
        Some(self.handle_event(event).await)
    }

    /// Apply every event already queued, without waiting.
    pub async fn process_pending(&mut self) -> Vec<MatchmakingUpdate> {
        let mut updates = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            updates.push(self.handle_event(event).await);
        }
        updates
    }

    /// Apply one event.
    pub async fn handle_event(&mut self, event: MatchmakingEvent) -> MatchmakingUpdate {
        match event {
            MatchmakingEvent::StatusChanged(status) => {
                debug!("Matchmaking status {:?}", status);
                if status == MatchmakingStatus::Disconnected {
                    // A rejoin may have reconnected before this event was drained
                    let live = self.socket.status().await;
                    if matches!(
                        live,
                        Some(MatchmakingStatus::Connecting | MatchmakingStatus::Connected)
                    ) {
                        debug!("Ignoring stale disconnect, socket is {:?}", live);
                        self.status = live;
                        return MatchmakingUpdate::Ignored;
                    }
                }
                self.status = Some(status);
                if status == MatchmakingStatus::Disconnected {
                    match self.queue {
                        QueueState::Searching => {
                            return self.end_search("connection closed".to_string());
                        }
                        // The service hangs up once a pairing is handed over
                        QueueState::Matched => {
                            debug!("Matchmaking closed after pairing");
                            self.queue = QueueState::Idle;
                        }
                        _ => {}
                    }
                }
                MatchmakingUpdate::Status(status)
            }
            MatchmakingEvent::Searching => {
                debug!("Service confirmed the search while {:?}", self.queue);
                MatchmakingUpdate::Ignored
            }
            MatchmakingEvent::SearchFailed { reason } => {
                if self.queue != QueueState::Searching {
                    return MatchmakingUpdate::Ignored;
                }
                warn!("Search failed: {}", reason);
                self.queue = QueueState::Failed(reason.clone());
                MatchmakingUpdate::SearchEnded { reason }
            }
            MatchmakingEvent::MatchFound(found) => {
                if self.queue != QueueState::Searching {
                    warn!(
                        "Ignoring match {} while {:?}",
                        hex::encode(found.session_id),
                        self.queue
                    );
                    return MatchmakingUpdate::Ignored;
                }
                self.on_match_found(found).await
            }
        }
    }

    #[instrument(skip(self, found), fields(session = %hex::encode(found.session_id)))]
    async fn on_match_found(&mut self, found: MatchFoundEvent) -> MatchmakingUpdate {
        let opponent = self.resolve_opponent(&found).await;
        self.opponents.set(opponent.player_id.clone(), opponent.clone());

        if !self.config.match_found_delay.is_zero() {
            tokio::time::sleep(self.config.match_found_delay).await;
        }

        let local = match self.local.clone() {
            Some(local) => local,
            None => return self.end_search("no local identity".to_string()),
        };

        if let Err(e) = self
            .battle_socket
            .connect(&found.session_id, &local.display_name, &local.player_id)
            .await
        {
            return self.end_search(format!("battle connect failed: {}", e));
        }

        info!(
            "Matched against {} ({})",
            opponent.display_name, found.opponent_rating
        );
        self.queue = QueueState::Matched;
        MatchmakingUpdate::Matched(MatchedInfo {
            session_id: found.session_id,
            local,
            local_rating: self.rating,
            opponent,
            opponent_rating: found.opponent_rating,
        })
    }

    /// Fetched profile, else last cached copy, else a name-only placeholder.
    async fn resolve_opponent(&self, found: &MatchFoundEvent) -> PlayerProfile {
        let id = &found.opponent.player_id;
        match self.profiles.fetch_profile(id).await {
            Ok(profile) if profile.player_id == *id => return profile,
            Ok(profile) => warn!("Profile lookup for {} returned {}", id, profile.player_id),
            Err(e) => debug!("Profile lookup for {} failed: {}", id, e),
        }

        self.opponents.get(id).unwrap_or_else(|| {
            PlayerProfile::placeholder(id.clone(), found.opponent.display_name.clone())
        })
    }

    fn end_search(&mut self, reason: String) -> MatchmakingUpdate {
        warn!("Search ended: {}", reason);
        self.queue = QueueState::Failed(reason.clone());
        MatchmakingUpdate::SearchEnded { reason }
    }
}

// =============================================================================
// TESTS
// =============================================================================
