//! Configuration
//!
//! Defaults for every component, overridable from the environment:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `WORD_BATTLE_STAKE` | `reconciler.stake` |
//! | `WORD_BATTLE_MATCH_SECONDS` | `battle.match_duration` |
//! | `WORD_BATTLE_MATCH_FOUND_DELAY_MS` | `matchmaking.match_found_delay` |
//! | `WORD_BATTLE_ABANDON_TIMEOUT_SECS` | `reconciler.abandon_timeout` |
//! | `WORD_BATTLE_DICTIONARY` | `dictionary_path` |
//! | `WORD_BATTLE_MATCHMAKING_URL` | `matchmaking_url` |
//! | `WORD_BATTLE_BATTLE_URL` | `battle_url` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::network::battle::BattleConfig;
use crate::network::matchmaking::MatchmakingConfig;
use crate::rating::reconciler::ReconcilerConfig;

/// Configuration for the whole match core.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreConfig {
    /// Matchmaking settings.
    pub matchmaking: MatchmakingConfig,
    /// Battle settings.
    pub battle: BattleConfig,
    /// Rating settings.
    pub reconciler: ReconcilerConfig,
    /// Dictionary file (JSON record or word list).
    pub dictionary_path: Option<PathBuf>,
    /// Matchmaking service URL.
    pub matchmaking_url: Option<String>,
    /// Battle service URL.
    pub battle_url: Option<String>,
}

impl CoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any key lookup, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        match parse::<i32>(&lookup, "WORD_BATTLE_STAKE") {
            Some(stake) if stake > 0 => config.reconciler.stake = stake,
            Some(stake) => warn!("Ignoring non-positive WORD_BATTLE_STAKE={}", stake),
            None => {}
        }
        if let Some(secs) = parse(&lookup, "WORD_BATTLE_MATCH_SECONDS") {
            config.battle.match_duration = Duration::from_secs(secs);
        }
        if let Some(ms) = parse(&lookup, "WORD_BATTLE_MATCH_FOUND_DELAY_MS") {
            config.matchmaking.match_found_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = parse(&lookup, "WORD_BATTLE_ABANDON_TIMEOUT_SECS") {
            config.reconciler.abandon_timeout = Duration::from_secs(secs);
        }
        config.dictionary_path = lookup("WORD_BATTLE_DICTIONARY").map(PathBuf::from);
        config.matchmaking_url = lookup("WORD_BATTLE_MATCHMAKING_URL");
        config.battle_url = lookup("WORD_BATTLE_BATTLE_URL");

        config
    }
}

/// Parse `key`, ignoring (with a warning) values that do not parse.
fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid {}={:?}", key, raw);
            None
        }
    }
}
