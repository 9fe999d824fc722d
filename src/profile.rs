//! Player Profiles
//!
//! Identity and public profile lookups. The store itself lives outside this
//! crate; matchmaking only needs the shape below.

use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// A player's public profile.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerProfile {
    /// Stable player identifier.
    pub player_id: String,
    /// Name shown to opponents and stored in results.
    pub display_name: String,
    /// Current skill rating, if known.
    pub rating: Option<i32>,
}

impl PlayerProfile {
    /// Create a full profile.
    pub fn new(player_id: impl Into<String>, display_name: impl Into<String>, rating: i32) -> Self {
        Self {
            player_id: player_id.into(),
            display_name: display_name.into(),
            rating: Some(rating),
        }
    }

    /// Stand-in profile used when the lookup fails: display name only.
    pub fn placeholder(player_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            display_name: display_name.into(),
            rating: None,
        }
    }

    /// True if this profile came from [`PlayerProfile::placeholder`].
    pub fn is_placeholder(&self) -> bool {
        self.rating.is_none()
    }
}

/// Profile lookup errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    /// No profile stored for this player.
    #[error("Profile not found: {0}")]
    NotFound(String),

    /// The store could not be reached.
    #[error("Profile lookup failed: {0}")]
    Lookup(String),
}

/// Identity and profile lookups.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// The signed-in player.
    async fn fetch_local_identity(&self) -> Result<PlayerProfile, ProfileError>;

    /// Another player's public profile.
    async fn fetch_profile(&self, player_id: &str) -> Result<PlayerProfile, ProfileError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_has_only_name() {
        let profile = PlayerProfile::placeholder("p-2", "bob");
        assert!(profile.is_placeholder());
        assert_eq!(profile.display_name, "bob");
        assert_eq!(profile.rating, None);

        assert!(!PlayerProfile::new("p-1", "alice", 1200).is_placeholder());
    }
}
