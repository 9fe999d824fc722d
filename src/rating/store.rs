//! Leaderboard score store.

use std::fmt;

use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Leaderboards a settlement writes to, in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardId {
    /// Skill rating. Source of truth for standings.
    CurrentRating,
    /// Cumulative experience.
    Experience,
    /// Cumulative stars.
    AllTimeStars,
}

impl LeaderboardId {
    /// Submission order.
    pub const ALL: [LeaderboardId; 3] = [
        LeaderboardId::CurrentRating,
        LeaderboardId::Experience,
        LeaderboardId::AllTimeStars,
    ];

    /// Stable name used by stores.
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaderboardId::CurrentRating => "current_rating",
            LeaderboardId::Experience => "experience",
            LeaderboardId::AllTimeStars => "all_time_stars",
        }
    }
}

impl fmt::Display for LeaderboardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score submission errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreStoreError {
    /// The store refused the score.
    #[error("Leaderboard {leaderboard} rejected score: {reason}")]
    Rejected {
        /// Leaderboard written.
        leaderboard: LeaderboardId,
        /// Store's reason.
        reason: String,
    },

    /// The store could not be reached.
    #[error("Score store unavailable: {0}")]
    Unavailable(String),
}

/// Remote leaderboard store.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Submit `score` to `leaderboard`. `context` tags the submission.
    async fn submit_score(
        &self,
        score: i64,
        leaderboard: LeaderboardId,
        context: i64,
    ) -> Result<(), ScoreStoreError>;
}
