//! Rating Reconciliation
//!
//! The stake is deducted the moment a match is found, before a single word
//! is played. When the match ends the authoritative delta is applied on top
//! of that deduction and all three leaderboards are written:
//!
//! ```text
//! matched:  rating -= stake                 (pending)
//! ended:    rating += delta + stake         (pending consumed)
//!           submit current_rating  ─ failure surfaced
//!           submit experience      ─ failure logged
//!           submit all_time_stars  ─ failure logged
//! ```
//!
//! Leaderboards always receive cumulative totals, so a missed experience or
//! stars write is overwritten by the next settlement. A missed rating write
//! has no second source and is reported to the caller.
//!
//! A match that never starts is rolled back: [`RatingReconciler::abandon`]
//! refunds the stake at once and [`RatingReconciler::rollback_if_stale`]
//! refunds a deduction older than the abandon timeout.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{info, warn, error, instrument};

use crate::game::results::{GameResults, MatchOutcome, SessionId};
use super::store::{LeaderboardId, ScoreStore, ScoreStoreError};

/// Reconciler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Rating at risk per match.
    pub stake: i32,
    /// Stars for a win.
    pub stars_win: i64,
    /// Stars for a draw.
    pub stars_draw: i64,
    /// Age after which an unsettled deduction is refunded.
    pub abandon_timeout: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            stake: 20,
            stars_win: 3,
            stars_draw: 1,
            abandon_timeout: Duration::from_secs(10 * 60),
        }
    }
}

/// A player's cumulative totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStanding {
    /// Skill rating.
    pub rating: i32,
    /// Experience points.
    pub experience: i64,
    /// All-time stars.
    pub stars: i64,
}

/// Stake deducted at match-found time, waiting for settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRatingAdjustment {
    /// Amount deducted.
    pub amount: i32,
    /// When it was deducted.
    pub applied_at: DateTime<Utc>,
    /// Match it belongs to.
    pub session_id: SessionId,
}

/// Outcome of a settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// Match settled.
    pub session_id: SessionId,
    /// Local outcome.
    pub outcome: MatchOutcome,
    /// Authoritative rating change for the match.
    pub delta: i32,
    /// Change applied at settlement (`delta + stake`).
    pub correction: i32,
    /// Totals after settlement.
    pub standing: PlayerStanding,
    /// Leaderboards whose submission failed.
    pub failed_leaderboards: Vec<LeaderboardId>,
}

/// Reconciliation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// A deduction is already waiting for settlement.
    #[error("Rating adjustment already pending for session {0}")]
    AdjustmentPending(String),

    /// Nothing to settle or refund.
    #[error("No pending rating adjustment")]
    NoPendingAdjustment,

    /// Results belong to a different match than the pending deduction.
    #[error("Results for session {found} do not match pending session {expected}")]
    SessionMismatch {
        /// Pending session.
        expected: String,
        /// Session in the results.
        found: String,
    },

    /// The current-rating write failed. Local totals were still updated.
    #[error("Rating submission failed: {source}")]
    RatingSubmission {
        /// Store error.
        source: ScoreStoreError,
        /// What was settled locally.
        settlement: Box<Settlement>,
    },
}

/// Applies stakes and settles match outcomes for the local player.
pub struct RatingReconciler {
    config: ReconcilerConfig,
    store: Arc<dyn ScoreStore>,
    standing: PlayerStanding,
    pending: Option<PendingRatingAdjustment>,
}

impl RatingReconciler {
    /// Create from the player's current totals.
    pub fn new(config: ReconcilerConfig, store: Arc<dyn ScoreStore>, standing: PlayerStanding) -> Self {
        Self {
            config,
            store,
            standing,
            pending: None,
        }
    }

    /// Current totals, including any pending deduction.
    pub fn standing(&self) -> PlayerStanding {
        self.standing
    }

    /// Deduction waiting for settlement.
    pub fn pending(&self) -> Option<&PendingRatingAdjustment> {
        self.pending.as_ref()
    }

    /// Deduct the stake for a freshly matched session.
    pub fn on_matched(&mut self, session_id: SessionId) -> Result<&PendingRatingAdjustment, ReconcileError> {
        self.on_matched_at(session_id, Utc::now())
    }

    /// [`RatingReconciler::on_matched`] with an explicit timestamp.
    pub fn on_matched_at(
        &mut self,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> Result<&PendingRatingAdjustment, ReconcileError> {
        if let Some(pending) = &self.pending {
            return Err(ReconcileError::AdjustmentPending(hex::encode(pending.session_id)));
        }

        let amount = self.config.stake;
        self.standing.rating = self.standing.rating.saturating_sub(amount);
        info!(
            "Staked {} rating on match {}, now {}",
            amount,
            hex::encode(session_id),
            self.standing.rating
        );

        Ok(self.pending.insert(PendingRatingAdjustment {
            amount,
            applied_at: now,
            session_id,
        }))
    }

    /// Settle a finished match and write all leaderboards.
    ///
    /// The outcome comes from `results.local_outcome`, never from names.
    #[instrument(skip(self, results), fields(session = %hex::encode(results.session_id)))]
    pub async fn on_ended(&mut self, results: &GameResults) -> Result<Settlement, ReconcileError> {
        let pending = self.pending.as_ref().ok_or(ReconcileError::NoPendingAdjustment)?;
        if pending.session_id != results.session_id {
            return Err(ReconcileError::SessionMismatch {
                expected: hex::encode(pending.session_id),
                found: hex::encode(results.session_id),
            });
        }
        let pending = match self.pending.take() {
            Some(pending) => pending,
            None => return Err(ReconcileError::NoPendingAdjustment),
        };

        let outcome = results.local_outcome;
        let delta = match outcome {
            MatchOutcome::Win => self.config.stake,
            MatchOutcome::Draw => 0,
            MatchOutcome::Loss => self.config.stake.saturating_neg(),
        };
        let correction = delta.saturating_add(pending.amount);
        let earned = results.local().map(|p| p.final_score as i64).unwrap_or(0);
        let stars = match outcome {
            MatchOutcome::Win => self.config.stars_win,
            MatchOutcome::Draw => self.config.stars_draw,
            MatchOutcome::Loss => 0,
        };

        self.standing.rating = self.standing.rating.saturating_add(correction);
        self.standing.experience = self.standing.experience.saturating_add(earned);
        self.standing.stars = self.standing.stars.saturating_add(stars);

        info!(
            "Settled {:?}: delta {}, rating {}, experience {}, stars {}",
            outcome, delta, self.standing.rating, self.standing.experience, self.standing.stars
        );

        let context = session_context(&results.session_id);
        let mut settlement = Settlement {
            session_id: results.session_id,
            outcome,
            delta,
            correction,
            standing: self.standing,
            failed_leaderboards: Vec::new(),
        };

        let mut rating_error = None;
        for leaderboard in LeaderboardId::ALL {
            let score = match leaderboard {
                LeaderboardId::CurrentRating => self.standing.rating as i64,
                LeaderboardId::Experience => self.standing.experience,
                LeaderboardId::AllTimeStars => self.standing.stars,
            };

            if let Err(e) = self.store.submit_score(score, leaderboard, context).await {
                settlement.failed_leaderboards.push(leaderboard);
                if leaderboard == LeaderboardId::CurrentRating {
                    error!("Rating submission failed, standings need manual correction: {}", e);
                    rating_error = Some(e);
                } else {
                    // Next settlement sends the cumulative total again
                    warn!("Submission to {} failed: {}", leaderboard, e);
                }
            }
        }

        match rating_error {
            Some(source) => Err(ReconcileError::RatingSubmission {
                source,
                settlement: Box::new(settlement),
            }),
            None => Ok(settlement),
        }
    }

    /// Refund the pending stake for a match that never started.
    pub fn abandon(&mut self) -> Result<PendingRatingAdjustment, ReconcileError> {
        let pending = self.pending.take().ok_or(ReconcileError::NoPendingAdjustment)?;
        self.refund(&pending);
        Ok(pending)
    }

    /// Refund the pending stake if it is older than the abandon timeout.
    pub fn rollback_if_stale(&mut self, now: DateTime<Utc>) -> Option<PendingRatingAdjustment> {
        let stale = self.pending.as_ref().is_some_and(|pending| {
            matches!((now - pending.applied_at).to_std(), Ok(age) if age >= self.config.abandon_timeout)
        });
        if !stale {
            return None;
        }

        let pending = self.pending.take()?;
        warn!(
            "Match {} never settled, refunding {}",
            hex::encode(pending.session_id),
            pending.amount
        );
        self.refund(&pending);
        Some(pending)
    }

    fn refund(&mut self, pending: &PendingRatingAdjustment) {
        self.standing.rating = self.standing.rating.saturating_add(pending.amount);
        info!(
            "Refunded {} rating for match {}, now {}",
            pending.amount,
            hex::encode(pending.session_id),
            self.standing.rating
        );
    }
}

/// Leaderboard context tag derived from the session ID.
fn session_context(session_id: &SessionId) -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&session_id[..8]);
    i64::from_le_bytes(bytes)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::results::{EndReason, PlayerResult};
    use crate::memory::MemoryScoreStore;

    const SESSION: SessionId = [5; 16];

    fn standing() -> PlayerStanding {
        PlayerStanding {
            rating: 1200,
            experience: 500,
            stars: 10,
        }
    }

    fn reconciler() -> (RatingReconciler, Arc<MemoryScoreStore>) {
        let store = Arc::new(MemoryScoreStore::new());
        let reconciler = RatingReconciler::new(ReconcilerConfig::default(), store.clone(), standing());
        (reconciler, store)
    }

    fn line(name: &str, score: u32) -> PlayerResult {
        PlayerResult {
            player_name: name.to_string(),
            rating_at_match_start: 1200,
            final_score: score,
            word_history: Vec::new(),
        }
    }

    fn results(session_id: SessionId, alice: u32, bob: u32) -> GameResults {
        GameResults::by_score(session_id, line("alice", alice), line("bob", bob), EndReason::ClockExpired)
    }

    #[test]
    fn test_stake_applied_on_match() {
        let (mut reconciler, _) = reconciler();

        let pending = reconciler.on_matched(SESSION).unwrap().clone();
        assert_eq!(pending.amount, 20);
        assert_eq!(pending.session_id, SESSION);
        assert_eq!(reconciler.standing().rating, 1180);
    }

    #[test]
    fn test_stake_never_applied_twice() {
        let (mut reconciler, _) = reconciler();
        reconciler.on_matched(SESSION).unwrap();

        let second = reconciler.on_matched([6; 16]);
        assert!(matches!(second, Err(ReconcileError::AdjustmentPending(_))));
        assert_eq!(reconciler.standing().rating, 1180);
    }

    #[tokio::test]
    async fn test_win_settles_and_submits_in_order() {
        let (mut reconciler, store) = reconciler();
        reconciler.on_matched(SESSION).unwrap();

        let settlement = reconciler.on_ended(&results(SESSION, 30, 10)).await.unwrap();
        assert_eq!(settlement.outcome, MatchOutcome::Win);
        assert_eq!(settlement.delta, 20);
        assert_eq!(settlement.correction, 40);
        assert_eq!(
            settlement.standing,
            PlayerStanding {
                rating: 1220,
                experience: 530,
                stars: 13,
            }
        );
        assert!(settlement.failed_leaderboards.is_empty());
        assert!(reconciler.pending().is_none());

        let order: Vec<_> = store.submissions().iter().map(|s| s.leaderboard).collect();
        assert_eq!(order, LeaderboardId::ALL.to_vec());
        assert_eq!(store.latest(LeaderboardId::CurrentRating), Some(1220));
        assert_eq!(store.latest(LeaderboardId::Experience), Some(530));
        assert_eq!(store.latest(LeaderboardId::AllTimeStars), Some(13));
    }

    #[tokio::test]
    async fn test_draw_and_loss_deltas() {
        let (mut reconciler, _) = reconciler();
        reconciler.on_matched(SESSION).unwrap();
        let draw = reconciler.on_ended(&results(SESSION, 8, 8)).await.unwrap();
        assert_eq!(draw.outcome, MatchOutcome::Draw);
        assert_eq!(draw.standing.rating, 1200);
        assert_eq!(draw.standing.stars, 11);

        let next = [6; 16];
        reconciler.on_matched(next).unwrap();
        let loss = reconciler.on_ended(&results(next, 1, 8)).await.unwrap();
        assert_eq!(loss.outcome, MatchOutcome::Loss);
        assert_eq!(loss.delta, -20);
        assert_eq!(loss.correction, 0);
        assert_eq!(loss.standing.rating, 1180);
        assert_eq!(loss.standing.stars, 11);
        assert_eq!(loss.standing.experience, 500 + 8 + 1);
    }

    #[tokio::test]
    async fn test_loss_against_namesake_settles_as_loss() {
        let (mut reconciler, store) = reconciler();
        reconciler.on_matched(SESSION).unwrap();

        let results = GameResults::by_score(
            SESSION,
            line("alex", 1),
            line("alex", 50),
            EndReason::ClockExpired,
        );
        let settlement = reconciler.on_ended(&results).await.unwrap();

        assert_eq!(settlement.outcome, MatchOutcome::Loss);
        assert_eq!(settlement.standing.rating, 1180);
        assert_eq!(settlement.standing.experience, 501);
        assert_eq!(store.latest(LeaderboardId::CurrentRating), Some(1180));
    }

    #[tokio::test]
    async fn test_extreme_stake_saturates() {
        let store = Arc::new(MemoryScoreStore::new());
        let config = ReconcilerConfig {
            stake: i32::MAX,
            ..ReconcilerConfig::default()
        };
        let mut reconciler = RatingReconciler::new(config, store, standing());
        reconciler.on_matched(SESSION).unwrap();

        let settlement = reconciler.on_ended(&results(SESSION, 1, 8)).await.unwrap();
        assert_eq!(settlement.delta, -i32::MAX);
        assert_eq!(settlement.correction, 0);
    }

    #[tokio::test]
    async fn test_settle_without_pending() {
        let (mut reconciler, store) = reconciler();

        let result = reconciler.on_ended(&results(SESSION, 1, 0)).await;
        assert_eq!(result, Err(ReconcileError::NoPendingAdjustment));
        assert!(store.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_session_mismatch_keeps_pending() {
        let (mut reconciler, store) = reconciler();
        reconciler.on_matched(SESSION).unwrap();

        let result = reconciler.on_ended(&results([9; 16], 1, 0)).await;
        assert!(matches!(result, Err(ReconcileError::SessionMismatch { .. })));
        assert!(reconciler.pending().is_some());
        assert_eq!(reconciler.standing().rating, 1180);
        assert!(store.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_secondary_failures_are_tolerated() {
        let (mut reconciler, store) = reconciler();
        store.set_failing(LeaderboardId::Experience, true);
        store.set_failing(LeaderboardId::AllTimeStars, true);
        reconciler.on_matched(SESSION).unwrap();

        let settlement = reconciler.on_ended(&results(SESSION, 5, 1)).await.unwrap();
        assert_eq!(
            settlement.failed_leaderboards,
            vec![LeaderboardId::Experience, LeaderboardId::AllTimeStars]
        );
        assert_eq!(store.latest(LeaderboardId::CurrentRating), Some(1220));
        assert_eq!(store.latest(LeaderboardId::Experience), None);

        // Next settlement carries the full totals
        store.set_failing(LeaderboardId::Experience, false);
        let next = [6; 16];
        reconciler.on_matched(next).unwrap();
        reconciler.on_ended(&results(next, 5, 1)).await.unwrap();
        assert_eq!(store.latest(LeaderboardId::Experience), Some(510));
    }

    #[tokio::test]
    async fn test_rating_failure_is_surfaced_after_all_submissions() {
        let (mut reconciler, store) = reconciler();
        store.set_failing(LeaderboardId::CurrentRating, true);
        reconciler.on_matched(SESSION).unwrap();

        let result = reconciler.on_ended(&results(SESSION, 5, 1)).await;
        match result {
            Err(ReconcileError::RatingSubmission { settlement, .. }) => {
                assert_eq!(settlement.failed_leaderboards, vec![LeaderboardId::CurrentRating]);
                assert_eq!(settlement.standing.rating, 1220);
            }
            other => panic!("expected rating failure, got {:?}", other),
        }

        assert_eq!(store.submissions().len(), 3);
        assert_eq!(store.latest(LeaderboardId::Experience), Some(505));
        assert!(reconciler.pending().is_none());
    }

    #[test]
    fn test_abandon_refunds() {
        let (mut reconciler, _) = reconciler();
        assert_eq!(reconciler.abandon(), Err(ReconcileError::NoPendingAdjustment));

        reconciler.on_matched(SESSION).unwrap();
        let refunded = reconciler.abandon().unwrap();
        assert_eq!(refunded.amount, 20);
        assert_eq!(reconciler.standing().rating, 1200);
        assert!(reconciler.pending().is_none());
    }

    #[test]
    fn test_rollback_if_stale() {
        let (mut reconciler, _) = reconciler();
        let start = Utc::now();
        reconciler.on_matched_at(SESSION, start).unwrap();

        assert!(reconciler.rollback_if_stale(start + chrono::Duration::minutes(9)).is_none());
        assert_eq!(reconciler.standing().rating, 1180);

        // Clock behind the deduction never counts as stale
        assert!(reconciler.rollback_if_stale(start - chrono::Duration::minutes(30)).is_none());

        let refunded = reconciler.rollback_if_stale(start + chrono::Duration::minutes(10));
        assert!(refunded.is_some());
        assert_eq!(reconciler.standing().rating, 1200);
        assert!(reconciler.rollback_if_stale(start + chrono::Duration::minutes(60)).is_none());
    }

    #[test]
    fn test_session_context() {
        let mut session = [0u8; 16];
        session[0] = 1;
        assert_eq!(session_context(&session), 1);
    }
}
