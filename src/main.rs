//! Word Battle demo
//!
//! Plays one scripted match between two local clients wired together with
//! the in-memory collaborators, then settles ratings for both.

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::EnvFilter;

use word_battle::{
    CoreConfig, VERSION,
    game::{Board, BoardScorer, Coord, DictionaryTrie, WordPath},
    memory::{MemoryBattleSocket, MemoryMatchmakingSocket, MemoryProfileStore, MemoryScoreStore},
    network::{
        BattleEvent, BattleSession, EventReceiver, MatchFoundEvent, MatchedInfo, MatchmakingEvent,
        MatchmakingSession, MatchmakingStatus, MatchmakingUpdate, OpponentIdentity,
    },
    profile::PlayerProfile,
    rating::{PlayerStanding, RatingReconciler},
};

const DEMO_WORDS: &str = "a\nan\nand\nant\nare\nart\nat\nate\near\neat\nera\nes\net\nhat\nhe\nher\nhit\nin\nis\nit\nlet\nline\nlit\nnet\nno\nnot\nnote\non\none\nor\nore\nrat\nrate\nrest\nrise\nsat\nsea\nseat\nset\nsit\nso\nstar\nstone\ntea\nten\nthe\nto\ntoe\nton\ntone\ntree\n";

/// One side of the demo match.
struct Client {
    name: String,
    matchmaking: MatchmakingSession,
    mm_socket: Arc<MemoryMatchmakingSocket>,
    battle: BattleSession,
    reconciler: RatingReconciler,
}

fn client(
    config: &CoreConfig,
    profile: PlayerProfile,
    opponent: PlayerProfile,
    dictionary: &Arc<DictionaryTrie>,
    battle_socket: (MemoryBattleSocket, EventReceiver<BattleEvent>),
) -> Client {
    let (mm_socket, mm_events) = MemoryMatchmakingSocket::new(Some(MatchmakingStatus::NotConnected));
    let mm_socket = Arc::new(mm_socket);
    let (battle_socket, battle_events) = battle_socket;
    let battle_socket = Arc::new(battle_socket);

    let profiles = Arc::new(MemoryProfileStore::new(profile.clone()));
    profiles.insert(opponent);

    let standing = PlayerStanding {
        rating: profile.rating.unwrap_or(1000),
        ..PlayerStanding::default()
    };

    Client {
        name: profile.display_name.clone(),
        matchmaking: MatchmakingSession::new(
            config.matchmaking.clone(),
            mm_socket.clone(),
            battle_socket.clone(),
            profiles,
            mm_events,
        ),
        mm_socket,
        battle: BattleSession::new(
            config.battle.clone(),
            BoardScorer::new(dictionary.clone()),
            battle_socket,
            battle_events,
        ),
        reconciler: RatingReconciler::new(
            config.reconciler.clone(),
            Arc::new(MemoryScoreStore::new()),
            standing,
        ),
    }
}

/// Every dictionary word reachable on the board by adjacent, non-repeating cells.
fn find_words(board: &Board, dictionary: &DictionaryTrie) -> Vec<WordPath> {
    fn walk(
        board: &Board,
        dictionary: &DictionaryTrie,
        path: &mut Vec<Coord>,
        word: &mut String,
        found: &mut Vec<(String, WordPath)>,
    ) {
        if !dictionary.has_prefix(word) {
            return;
        }
        let seen = found.iter().any(|(w, _)| w.as_str() == word.as_str());
        if word.len() > 1 && !seen && dictionary.exists(word) {
            found.push((word.clone(), WordPath::new(path.clone())));
        }

        let Some(&last) = path.last() else { return };
        for dr in -1i64..=1 {
            for dc in -1i64..=1 {
                let row = last.row as i64 + dr;
                let col = last.col as i64 + dc;
                if row < 0 || col < 0 {
                    continue;
                }
                let next = Coord::new(row as usize, col as usize);
                if path.contains(&next) {
                    continue;
                }
                if let Some(tile) = board.get(next) {
                    path.push(next);
                    word.extend(tile.letter.to_lowercase());
                    walk(board, dictionary, path, word, found);
                    word.pop();
                    path.pop();
                }
            }
        }
    }

    let mut found = Vec::new();
    for (coord, tile) in board.tiles() {
        let mut path = vec![coord];
        let mut word: String = tile.letter.to_lowercase().collect();
        walk(board, dictionary, &mut path, &mut word, &mut found);
    }
    found.into_iter().map(|(_, path)| path).collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Word Battle v{}", VERSION);

    let config = CoreConfig::from_env();
    for url in [&config.matchmaking_url, &config.battle_url].into_iter().flatten() {
        info!("Ignoring service URL {}; the demo runs in memory", url);
    }
    let dictionary = match &config.dictionary_path {
        Some(path) => DictionaryTrie::load_file(path)
            .with_context(|| format!("loading dictionary {}", path.display()))?,
        None => DictionaryTrie::from_word_list(DEMO_WORDS),
    };
    let dictionary = Arc::new(dictionary);
    info!("Dictionary ready with {} words", dictionary.len());

    let alice_profile = PlayerProfile::new("p-alice", "alice", 1200);
    let bob_profile = PlayerProfile::new("p-bob", "bob", 1180);

    let (alice_battle, bob_battle) = MemoryBattleSocket::pair();
    let mut alice = client(
        &config,
        alice_profile.clone(),
        bob_profile.clone(),
        &dictionary,
        alice_battle,
    );
    let mut bob = client(
        &config,
        bob_profile.clone(),
        alice_profile.clone(),
        &dictionary,
        bob_battle,
    );

    // Both players queue
    for c in [&mut alice, &mut bob] {
        let rating = c.reconciler.standing().rating;
        c.matchmaking.join_queue(rating).await?;
    }

    // The service pairs them
    let session_id = uuid::Uuid::new_v4().into_bytes();
    info!("=== Match {} ===", hex::encode(session_id));
    alice.mm_socket.announce(match_found(session_id, &bob_profile));
    bob.mm_socket.announce(match_found(session_id, &alice_profile));

    for c in [&mut alice, &mut bob] {
        let info = wait_for_match(&mut c.matchmaking).await?;
        c.reconciler.on_matched(info.session_id)?;
        c.battle.on_match_found(&info)?;
    }

    let board = match alice.battle.board() {
        Some(board) => board.clone(),
        None => bail!("battle started without a board"),
    };
    for row in board.letter_rows() {
        info!("  {}", row);
    }

    // Players alternate through the words on the board
    let words = find_words(&board, &dictionary);
    info!("{} words on the board", words.len());
    for (turn, path) in words.into_iter().enumerate() {
        let player = if turn % 3 == 0 { &mut bob } else { &mut alice };
        if let Some(scored) = player.battle.submit_word(path).await {
            info!("{} plays {} for {}", player.name, scored.word, scored.score);
        }
    }
    alice.battle.process_pending();
    bob.battle.process_pending();

    // Clock runs out on both clients
    for c in [&mut alice, &mut bob] {
        c.battle.handle_event(BattleEvent::ClockExpired);
    }

    for c in [&mut alice, &mut bob] {
        let results = match c.battle.results() {
            Some(results) => results.clone(),
            None => bail!("{} has no results", c.name),
        };
        let settlement = c.reconciler.on_ended(&results).await?;
        info!(
            "{}: {:?}, rating {} -> {}, experience {}, stars {}",
            c.name,
            settlement.outcome,
            settlement.standing.rating - settlement.delta,
            settlement.standing.rating,
            settlement.standing.experience,
            settlement.standing.stars
        );
    }

    let (alice_score, bob_score) = alice.battle.scores();
    let (bob_view_bob, bob_view_alice) = bob.battle.scores();
    if (alice_score, bob_score) != (bob_view_alice, bob_view_bob) {
        bail!("clients disagree on the score");
    }
    info!("=== Final: alice {} - bob {} ===", alice_score, bob_score);

    Ok(())
}

fn match_found(session_id: word_battle::SessionId, opponent: &PlayerProfile) -> MatchmakingEvent {
    MatchmakingEvent::MatchFound(MatchFoundEvent {
        session_id,
        opponent: OpponentIdentity {
            player_id: opponent.player_id.clone(),
            display_name: opponent.display_name.clone(),
        },
        opponent_rating: opponent.rating.unwrap_or(1000),
    })
}

async fn wait_for_match(session: &mut MatchmakingSession) -> anyhow::Result<MatchedInfo> {
    while let Some(update) = session.process_next().await {
        match update {
            MatchmakingUpdate::Matched(info) => return Ok(info),
            MatchmakingUpdate::SearchEnded { reason } => bail!("search ended: {}", reason),
            _ => {}
        }
    }
    bail!("matchmaking queue closed")
}
