//! Rating Module
//!
//! Stake deduction at match-found time and post-match settlement across the
//! current-rating, experience and all-time-stars leaderboards.

pub mod store;
pub mod reconciler;

pub use store::{LeaderboardId, ScoreStore, ScoreStoreError};
pub use reconciler::{
    PendingRatingAdjustment, PlayerStanding, RatingReconciler, ReconcileError, ReconcilerConfig,
    Settlement,
};
