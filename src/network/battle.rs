//! Battle Session
//!
//! Runs one live match from the local client's side: scores our words,
//! broadcasts their paths, scores the opponent's paths against our own copy
//! of the board and assembles the results when the match ends.
//!
//! ```text
//! Searching ──on_match_found──▶ Matched ──clock expired / opponent ended──▶ Ended
//!                                  │                                       ▲
//!                                  └──── forfeit / opponent left ──────────┘
//! ```
//!
//! Only paths cross the wire, never points: each side computes every score
//! itself from the same board.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn, debug, instrument};

use crate::game::board::{Board, BoardConfig, Score, WordPath};
use crate::game::results::{EndReason, GameResults, PlayerResult, SessionId, WordEntry};
use crate::game::scorer::{BoardScorer, ScoredWord};
use super::matchmaking::MatchedInfo;
use super::socket::{BattleEvent, BattleSocket, EventReceiver};

/// Battle configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattleConfig {
    /// Length of a match.
    pub match_duration: Duration,
    /// Board generation parameters.
    pub board: BoardConfig,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            match_duration: Duration::from_secs(90),
            board: BoardConfig::default(),
        }
    }
}

/// Battle lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BattleState {
    /// Waiting for matchmaking.
    Searching,
    /// Battle is live.
    Matched {
        /// Battle session.
        session_id: SessionId,
        /// Opponent's display name.
        opponent_name: String,
    },
    /// Battle is over. Terminal.
    Ended(GameResults),
}

/// Result of applying one battle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BattleUpdate {
    /// The opponent's path was scored.
    OpponentScored(ScoredWord),
    /// The clock moved.
    Clock {
        /// Time since start.
        elapsed: Duration,
        /// Time left.
        remaining: Duration,
    },
    /// The battle ended.
    Ended(GameResults),
    /// Our connection is unreliable; local scores are kept.
    Degraded {
        /// Transport detail.
        reason: String,
    },
    /// Event did not apply in the current state.
    Ignored,
}

/// Battle errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BattleError {
    /// A battle is already running in this session.
    #[error("Battle already started")]
    AlreadyStarted,

    /// The battle is over.
    #[error("Battle has ended")]
    AlreadyEnded,
}

/// Running totals for one side.
#[derive(Debug, Clone, Default)]
struct Tally {
    name: String,
    rating: i32,
    score: Score,
    history: Vec<WordEntry>,
    found: HashSet<String>,
}

impl Tally {
    fn new(name: &str, rating: i32) -> Self {
        Self {
            name: name.to_string(),
            rating,
            ..Self::default()
        }
    }

    /// Record a scored word. Repeats of an already-scored word earn nothing.
    fn record(&mut self, mut scored: ScoredWord, path: WordPath, elapsed: Duration) -> ScoredWord {
        if scored.score > 0 && !self.found.insert(scored.word.clone()) {
            scored.score = 0;
        }
        self.score = self.score.saturating_add(scored.score);
        self.history.push(WordEntry {
            word: scored.word.clone(),
            path,
            elapsed,
            score: scored.score,
        });
        scored
    }

    fn is_repeat(&self, word: &str) -> bool {
        self.found.contains(word)
    }

    fn result(&self) -> PlayerResult {
        PlayerResult {
            player_name: self.name.clone(),
            rating_at_match_start: self.rating,
            final_score: self.score,
            word_history: self.history.clone(),
        }
    }
}

/// Live match state machine for the local client.
pub struct BattleSession {
    config: BattleConfig,
    scorer: BoardScorer,
    socket: Arc<dyn BattleSocket>,
    events: EventReceiver<BattleEvent>,
    state: BattleState,
    board: Option<Board>,
    local: Tally,
    opponent: Tally,
    elapsed: Duration,
    degraded: bool,
}

impl BattleSession {
    /// Create a session waiting for a match. `events` must be fed by `socket`.
    pub fn new(
        config: BattleConfig,
        scorer: BoardScorer,
        socket: Arc<dyn BattleSocket>,
        events: EventReceiver<BattleEvent>,
    ) -> Self {
        Self {
            config,
            scorer,
            socket,
            events,
            state: BattleState::Searching,
            board: None,
            local: Tally::default(),
            opponent: Tally::default(),
            elapsed: Duration::ZERO,
            degraded: false,
        }
    }

    /// Start the battle on the board both clients derive from the session.
    pub fn on_match_found(&mut self, info: &MatchedInfo) -> Result<(), BattleError> {
        let board = Board::for_session(
            &info.session_id,
            &[info.local.player_id.as_str(), info.opponent.player_id.as_str()],
            &self.config.board,
        );
        self.on_match_found_with_board(info, board)
    }

    /// Start the battle on a board received verbatim.
    pub fn on_match_found_with_board(&mut self, info: &MatchedInfo, board: Board) -> Result<(), BattleError> {
        match self.state {
            BattleState::Searching => {}
            BattleState::Matched { .. } => return Err(BattleError::AlreadyStarted),
            BattleState::Ended(_) => return Err(BattleError::AlreadyEnded),
        }

        info!(
            "Battle {} against {} on board {} ({})",
            hex::encode(info.session_id),
            info.opponent.display_name,
            board.letter_rows().join("/"),
            hex::encode(&board.fingerprint()[..8])
        );

        self.local = Tally::new(&info.local.display_name, info.local_rating);
        self.opponent = Tally::new(&info.opponent.display_name, info.opponent_rating);
        self.board = Some(board);
        self.elapsed = Duration::ZERO;
        self.state = BattleState::Matched {
            session_id: info.session_id,
            opponent_name: info.opponent.display_name.clone(),
        };
        Ok(())
    }

    /// Current state.
    pub fn state(&self) -> &BattleState {
        &self.state
    }

    /// Board in play, once matched.
    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    /// `(local, opponent)` running scores.
    pub fn scores(&self) -> (Score, Score) {
        (self.local.score, self.opponent.score)
    }

    /// Time since the battle started.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Time left on the clock.
    pub fn remaining(&self) -> Duration {
        self.config.match_duration.saturating_sub(self.elapsed)
    }

    /// True once a send failed or the connection dropped.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Final results, once ended.
    pub fn results(&self) -> Option<&GameResults> {
        match &self.state {
            BattleState::Ended(results) => Some(results),
            _ => None,
        }
    }

    /// Score a traced path and send it to the opponent.
    ///
    /// Returns `None` when no battle is live; late submissions are expected
    /// around clock expiry and are dropped without error.
    #[instrument(skip(self, path), fields(cells = path.len()))]
    pub async fn submit_word(&mut self, path: WordPath) -> Option<ScoredWord> {
        if !matches!(self.state, BattleState::Matched { .. }) {
            debug!("Dropping submission outside a live battle");
            return None;
        }
        let board = self.board.as_ref()?;

        let scored = self.scorer.evaluate_word(&path, board);
        let repeat = scored.score > 0 && self.local.is_repeat(&scored.word);
        let scored = self.local.record(scored, path.clone(), self.elapsed);

        if repeat {
            debug!("Already found {}", scored.word);
            return Some(scored);
        }

        debug!("Scored {} for {}", scored.word, scored.score);
        if let Err(e) = self.socket.send_word_path(&path).await {
            warn!("Word path not delivered: {}", e);
            self.degraded = true;
        }
        Some(scored)
    }

    /// Leave the battle. The opponent wins.
    ///
    /// Terminal at once; a failed leave request is only logged.
    #[instrument(skip(self))]
    pub async fn forfeit(&mut self) -> Option<GameResults> {
        if !matches!(self.state, BattleState::Matched { .. }) {
            return None;
        }

        let results = self.finish(Some(false), EndReason::Forfeit);
        if let Err(e) = self.socket.leave_game().await {
            warn!("Leave request failed: {}", e);
        }
        Some(results)
    }

    /// Wait for the next event and apply it.
    ///
    /// Returns `None` once the socket side of the queue is gone.
    pub async fn process_next(&mut self) -> Option<BattleUpdate> {
        let event = self.events.recv().await?;
        Some(self.handle_event(event))
    }

    /// Apply every event already queued, without waiting.
    pub fn process_pending(&mut self) -> Vec<BattleUpdate> {
        let mut updates = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            updates.push(self.handle_event(event));
        }
        updates
    }

    /// Apply one event.
    pub fn handle_event(&mut self, event: BattleEvent) -> BattleUpdate {
        if !matches!(self.state, BattleState::Matched { .. }) {
            debug!("Ignoring {:?} outside a live battle", event);
            return BattleUpdate::Ignored;
        }

        match event {
            BattleEvent::OpponentWordPath(path) => {
                let board = match self.board.as_ref() {
                    Some(board) => board,
                    None => return BattleUpdate::Ignored,
                };
                let scored = self.scorer.evaluate_word(&path, board);
                let scored = self.opponent.record(scored, path, self.elapsed);
                debug!("Opponent scored {} for {}", scored.word, scored.score);
                BattleUpdate::OpponentScored(scored)
            }
            BattleEvent::ClockTick { elapsed } => {
                self.elapsed = elapsed.min(self.config.match_duration);
                BattleUpdate::Clock {
                    elapsed: self.elapsed,
                    remaining: self.remaining(),
                }
            }
            BattleEvent::ClockExpired => {
                self.elapsed = self.config.match_duration;
                BattleUpdate::Ended(self.finish(None, EndReason::ClockExpired))
            }
            BattleEvent::OpponentEnded => BattleUpdate::Ended(self.finish(None, EndReason::OpponentEnded)),
            BattleEvent::OpponentLeft => BattleUpdate::Ended(self.finish(Some(true), EndReason::OpponentLeft)),
            BattleEvent::ConnectionLost { reason } => {
                warn!("Battle connection lost: {}", reason);
                self.degraded = true;
                BattleUpdate::Degraded { reason }
            }
        }
    }

    /// Move to `Ended`. `local_wins` fixes the winner; `None` decides by score.
    fn finish(&mut self, local_wins: Option<bool>, reason: EndReason) -> GameResults {
        let session_id = match &self.state {
            BattleState::Matched { session_id, .. } => *session_id,
            _ => [0; 16],
        };

        let local = self.local.result();
        let opponent = self.opponent.result();
        let results = match local_wins {
            Some(local_wins) => GameResults::with_winner(session_id, local, opponent, local_wins, reason),
            None => GameResults::by_score(session_id, local, opponent, reason),
        };

        info!(
            "Battle {} ended ({:?}): {} to {}, winner {}",
            hex::encode(session_id),
            reason,
            self.local.score,
            self.opponent.score,
            results.winner_identity
        );
        self.state = BattleState::Ended(results.clone());
        results
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::board::Tile;
    use crate::game::results::{MatchOutcome, DRAW_MARKER};
    use crate::game::trie::DictionaryTrie;
    use crate::memory::{BattleCall, MemoryBattleSocket};
    use crate::profile::PlayerProfile;

    const SESSION: SessionId = [4; 16];

    // C A T
    // S O G
    fn board() -> Board {
        Board::from_rows(vec![
            vec![Tile::new('C', 3), Tile::new('A', 1), Tile::new('T', 1).with_word_multiplier(2)],
            vec![Tile::new('S', 1), Tile::new('O', 1), Tile::new('G', 2)],
        ])
        .unwrap()
    }

    fn info() -> MatchedInfo {
        MatchedInfo {
            session_id: SESSION,
            local: PlayerProfile::new("p-1", "alice", 1200),
            local_rating: 1200,
            opponent: PlayerProfile::new("p-2", "bob", 1250),
            opponent_rating: 1250,
        }
    }

    fn battle() -> (BattleSession, Arc<MemoryBattleSocket>) {
        let (socket, events) = MemoryBattleSocket::new();
        let socket = Arc::new(socket);
        let scorer = BoardScorer::new(Arc::new(DictionaryTrie::from_words(["cat", "cats", "dog", "go", "so"])));
        let mut session = BattleSession::new(BattleConfig::default(), scorer, socket.clone(), events);
        session.on_match_found_with_board(&info(), board()).unwrap();
        (session, socket)
    }

    fn cat() -> WordPath {
        WordPath::from(vec![(0, 0), (0, 1), (0, 2)])
    }

    fn go() -> WordPath {
        WordPath::from(vec![(1, 2), (1, 1)])
    }

    #[tokio::test]
    async fn test_submit_scores_and_broadcasts_path() {
        let (mut session, socket) = battle();

        let scored = session.submit_word(cat()).await.unwrap();
        assert_eq!(scored.word, "cat");
        assert_eq!(scored.score, 10);
        assert_eq!(session.scores(), (10, 0));
        assert_eq!(socket.calls(), vec![BattleCall::SendWordPath(cat())]);
    }

    #[tokio::test]
    async fn test_repeat_word_scores_zero_and_is_not_sent() {
        let (mut session, socket) = battle();

        session.submit_word(cat()).await.unwrap();
        let again = session.submit_word(cat()).await.unwrap();

        assert_eq!(again.score, 0);
        assert_eq!(session.scores(), (10, 0));
        assert_eq!(socket.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_non_word_still_sent() {
        let (mut session, socket) = battle();

        let scored = session.submit_word(WordPath::from(vec![(0, 1), (0, 0)])).await.unwrap();
        assert_eq!(scored.score, 0);
        assert_eq!(socket.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_opponent_paths_scored_on_local_board() {
        let (mut session, _) = battle();

        let update = session.handle_event(BattleEvent::OpponentWordPath(go()));
        assert_eq!(
            update,
            BattleUpdate::OpponentScored(ScoredWord { word: "go".to_string(), score: 3 })
        );

        // Opponent repeats earn nothing either
        session.handle_event(BattleEvent::OpponentWordPath(go()));
        assert_eq!(session.scores(), (0, 3));
    }

    #[tokio::test]
    async fn test_clock_expiry_decides_by_score() {
        let (mut session, _) = battle();
        session.submit_word(cat()).await;
        session.handle_event(BattleEvent::OpponentWordPath(go()));

        let update = session.handle_event(BattleEvent::ClockExpired);
        let results = match update {
            BattleUpdate::Ended(results) => results,
            other => panic!("expected end, got {:?}", other),
        };
        assert_eq!(results.winner_identity, "alice");
        assert_eq!(results.end_reason, EndReason::ClockExpired);
        assert_eq!(results.session_id, SESSION);
        assert_eq!(results.local_outcome, MatchOutcome::Win);
        assert_eq!(results.local().unwrap().word_history.len(), 1);
        assert_eq!(results.opponent().unwrap().final_score, 3);
        assert_eq!(results.opponent().unwrap().rating_at_match_start, 1250);
        assert_eq!(session.remaining(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_tie_ends_in_draw() {
        let (mut session, _) = battle();

        session.handle_event(BattleEvent::OpponentEnded);
        let results = session.results().unwrap();
        assert_eq!(results.winner_identity, DRAW_MARKER);
        assert_eq!(results.end_reason, EndReason::OpponentEnded);
    }

    #[tokio::test]
    async fn test_submissions_after_end_do_nothing() {
        let (mut session, socket) = battle();
        session.submit_word(cat()).await;
        session.handle_event(BattleEvent::ClockExpired);
        let before = session.results().cloned();

        assert_eq!(session.submit_word(go()).await, None);
        assert_eq!(session.scores(), (10, 0));
        assert_eq!(session.results().cloned(), before);
        assert_eq!(socket.calls().len(), 1);

        assert_eq!(session.handle_event(BattleEvent::OpponentWordPath(go())), BattleUpdate::Ignored);
        assert_eq!(session.scores(), (10, 0));
    }

    #[tokio::test]
    async fn test_forfeit_gives_opponent_the_win() {
        let (mut session, socket) = battle();
        session.submit_word(cat()).await;

        let results = session.forfeit().await.unwrap();
        assert_eq!(results.winner_identity, "bob");
        assert_eq!(results.end_reason, EndReason::Forfeit);
        assert_eq!(socket.calls().last(), Some(&BattleCall::LeaveGame));
        assert!(session.forfeit().await.is_none());
    }

    #[tokio::test]
    async fn test_forfeit_is_terminal_even_if_leave_fails() {
        let (mut session, socket) = battle();
        socket.fail_sends(true);

        assert!(session.forfeit().await.is_some());
        assert!(matches!(session.state(), BattleState::Ended(_)));
    }

    #[tokio::test]
    async fn test_opponent_left_gives_local_win() {
        let (mut session, _) = battle();
        session.handle_event(BattleEvent::OpponentWordPath(go()));

        session.handle_event(BattleEvent::OpponentLeft);
        let results = session.results().unwrap();
        assert_eq!(results.winner_identity, "alice");
        assert_eq!(results.end_reason, EndReason::OpponentLeft);
    }

    #[tokio::test]
    async fn test_socket_failure_keeps_scores() {
        let (mut session, socket) = battle();
        socket.fail_sends(true);

        let scored = session.submit_word(cat()).await.unwrap();
        assert_eq!(scored.score, 10);
        assert!(session.is_degraded());

        let update = session.handle_event(BattleEvent::ConnectionLost { reason: "reset".to_string() });
        assert_eq!(update, BattleUpdate::Degraded { reason: "reset".to_string() });
        assert_eq!(session.scores(), (10, 0));
        assert!(matches!(session.state(), BattleState::Matched { .. }));
    }

    #[tokio::test]
    async fn test_clock_ticks() {
        let (mut session, _) = battle();

        let update = session.handle_event(BattleEvent::ClockTick { elapsed: Duration::from_secs(30) });
        assert_eq!(
            update,
            BattleUpdate::Clock {
                elapsed: Duration::from_secs(30),
                remaining: Duration::from_secs(60),
            }
        );

        let scored = session.submit_word(cat()).await.unwrap();
        assert_eq!(scored.score, 10);
        let results = session.forfeit().await.unwrap();
        assert_eq!(results.player_results[0].word_history[0].elapsed, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_searching_ignores_everything() {
        let (socket, events) = MemoryBattleSocket::new();
        let scorer = BoardScorer::new(Arc::new(DictionaryTrie::from_words(["cat"])));
        let mut session = BattleSession::new(BattleConfig::default(), scorer, Arc::new(socket), events);

        assert_eq!(session.submit_word(cat()).await, None);
        assert_eq!(session.handle_event(BattleEvent::ClockExpired), BattleUpdate::Ignored);
        assert_eq!(session.state(), &BattleState::Searching);
        assert!(session.forfeit().await.is_none());
    }

    #[tokio::test]
    async fn test_match_found_twice() {
        let (mut session, _) = battle();
        assert_eq!(session.on_match_found(&info()), Err(BattleError::AlreadyStarted));

        session.handle_event(BattleEvent::ClockExpired);
        assert_eq!(session.on_match_found(&info()), Err(BattleError::AlreadyEnded));
    }

    #[tokio::test]
    async fn test_generated_board_matches_opponent() {
        let dictionary = Arc::new(DictionaryTrie::from_words(["cat"]));
        let ((a_socket, a_events), (b_socket, b_events)) = MemoryBattleSocket::pair();
        let mut alice = BattleSession::new(
            BattleConfig::default(),
            BoardScorer::new(dictionary.clone()),
            Arc::new(a_socket),
            a_events,
        );
        let mut bob = BattleSession::new(
            BattleConfig::default(),
            BoardScorer::new(dictionary),
            Arc::new(b_socket),
            b_events,
        );

        let alice_view = info();
        let bob_view = MatchedInfo {
            session_id: SESSION,
            local: alice_view.opponent.clone(),
            local_rating: 1250,
            opponent: alice_view.local.clone(),
            opponent_rating: 1200,
        };
        alice.on_match_found(&alice_view).unwrap();
        bob.on_match_found(&bob_view).unwrap();

        assert_eq!(
            alice.board().unwrap().fingerprint(),
            bob.board().unwrap().fingerprint()
        );
    }
}
