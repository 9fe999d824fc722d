//! WebSocket Sockets
//!
//! [`MatchmakingSocket`] and [`BattleSocket`] over `tokio-tungstenite`.
//! Requests go onto an outgoing queue drained by a connection task, so every
//! trait call returns as soon as the request is queued. The same task reads
//! notices and pushes them as events onto the owner's queue.
//!
//! Each `connect` starts a new connection generation. A task from an older
//! generation may still report its close after a reconnect; those signals
//! are dropped so they cannot clobber the live connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn, error, debug};

use crate::game::board::WordPath;
use crate::game::results::SessionId;
use super::protocol::{BattleNotice, BattleRequest, MatchmakingNotice, MatchmakingRequest};
use super::socket::{
    event_queue, BattleEvent, BattleSocket, EventReceiver, EventSender, MatchmakingEvent,
    MatchmakingSocket, MatchmakingStatus, SocketError,
};

/// What the connection task reports back.
enum Signal {
    Opened,
    Text(String),
    Closed(Option<String>),
}

/// Open `url` in the background and pump messages both ways.
///
/// Queued requests are sent once the handshake completes. Dropping the
/// sender flushes what is queued and closes the connection.
fn spawn_connection<R, F>(url: String, mut outgoing: mpsc::UnboundedReceiver<R>, on_signal: F)
where
    R: Serialize + Send + 'static,
    F: Fn(Signal) + Send + 'static,
{
    tokio::spawn(async move {
        let ws_stream = match connect_async(url.as_str()).await {
            Ok((ws, _)) => ws,
            Err(e) => {
                error!("WebSocket connect to {} failed: {}", url, e);
                on_signal(Signal::Closed(Some(e.to_string())));
                return;
            }
        };
        debug!("Connected to {}", url);
        on_signal(Signal::Opened);

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        loop {
            tokio::select! {
                request = outgoing.recv() => {
                    let request = match request {
                        Some(request) => request,
                        None => {
                            let _ = ws_sender.close().await;
                            on_signal(Signal::Closed(None));
                            return;
                        }
                    };
                    let text = match serde_json::to_string(&request) {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize request: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = ws_sender.send(Message::Text(text)).await {
                        on_signal(Signal::Closed(Some(e.to_string())));
                        return;
                    }
                }
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => on_signal(Signal::Text(text)),
                        Some(Ok(Message::Close(_))) | None => {
                            on_signal(Signal::Closed(None));
                            return;
                        }
                        Some(Err(e)) => {
                            on_signal(Signal::Closed(Some(e.to_string())));
                            return;
                        }
                        _ => {}
                    }
                }
            }
        }
    });
}

/// Connection generation shared between a socket and its tasks.
#[derive(Clone, Default)]
struct Generation(Arc<AtomicU64>);

impl Generation {
    /// Start a new generation, retiring every earlier one.
    fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.0.load(Ordering::SeqCst) == generation
    }
}

fn queue<R>(outgoing: &Mutex<Option<mpsc::UnboundedSender<R>>>, request: R) -> Result<(), SocketError> {
    match outgoing.lock().as_ref() {
        Some(tx) => tx.send(request).map_err(|_| SocketError::Closed),
        None => Err(SocketError::Closed),
    }
}

// =============================================================================
// MATCHMAKING
// =============================================================================

/// Matchmaking socket over WebSocket.
pub struct WsMatchmakingSocket {
    url: String,
    generation: Generation,
    status: Arc<Mutex<MatchmakingStatus>>,
    outgoing: Mutex<Option<mpsc::UnboundedSender<MatchmakingRequest>>>,
    events: EventSender<MatchmakingEvent>,
}

impl WsMatchmakingSocket {
    /// Create a socket for the service at `url`.
    pub fn new(url: impl Into<String>) -> (Self, EventReceiver<MatchmakingEvent>) {
        let (events, rx) = event_queue();
        let socket = Self {
            url: url.into(),
            generation: Generation::default(),
            status: Arc::new(Mutex::new(MatchmakingStatus::NotConnected)),
            outgoing: Mutex::new(None),
            events,
        };
        (socket, rx)
    }

    fn set_status(&self, status: MatchmakingStatus) {
        *self.status.lock() = status;
        let _ = self.events.send(MatchmakingEvent::StatusChanged(status));
    }
}

#[async_trait]
impl MatchmakingSocket for WsMatchmakingSocket {
    async fn status(&self) -> Option<MatchmakingStatus> {
        Some(*self.status.lock())
    }

    async fn connect(&self, player_id: &str, display_name: &str) -> Result<(), SocketError> {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(MatchmakingRequest::Hello {
            player_id: player_id.to_string(),
            display_name: display_name.to_string(),
        })
        .map_err(|_| SocketError::Closed)?;
        *self.outgoing.lock() = Some(tx);
        let current = self.generation.advance();
        self.set_status(MatchmakingStatus::Connecting);

        let generation = self.generation.clone();
        let status = self.status.clone();
        let events = self.events.clone();
        spawn_connection(self.url.clone(), rx, move |signal| match signal {
            _ if !generation.is_current(current) => {
                debug!("Dropping signal from retired matchmaking connection {}", current);
            }
            Signal::Opened => {
                *status.lock() = MatchmakingStatus::Connected;
                let _ = events.send(MatchmakingEvent::StatusChanged(MatchmakingStatus::Connected));
            }
            Signal::Text(text) => match MatchmakingNotice::from_json(&text) {
                Ok(notice) => match notice.into_event() {
                    Some(event) => {
                        let _ = events.send(event);
                    }
                    None => warn!("Dropping notice with invalid session ID"),
                },
                Err(e) => debug!("Invalid matchmaking notice: {}", e),
            },
            Signal::Closed(reason) => {
                if let Some(reason) = &reason {
                    warn!("Matchmaking connection closed: {}", reason);
                }
                *status.lock() = MatchmakingStatus::Disconnected;
                let _ = events.send(MatchmakingEvent::StatusChanged(MatchmakingStatus::Disconnected));
            }
        });

        info!("Connecting to matchmaking at {}", self.url);
        Ok(())
    }

    async fn find_match(&self, rating: i32) -> Result<(), SocketError> {
        queue(&self.outgoing, MatchmakingRequest::FindMatch { rating })
    }

    async fn disconnect(&self) -> Result<(), SocketError> {
        let tx = self.outgoing.lock().take();
        let result = match tx {
            // Dropping the sender closes the connection after the cancel is flushed
            Some(tx) => tx
                .send(MatchmakingRequest::CancelSearch)
                .map_err(|_| SocketError::Closed),
            None => Err(SocketError::Closed),
        };
        // The closing task is retired; report the disconnect here instead
        self.generation.advance();
        self.set_status(MatchmakingStatus::Disconnected);
        result
    }
}

// =============================================================================
// BATTLE
// =============================================================================

/// Battle socket over WebSocket.
pub struct WsBattleSocket {
    url: String,
    generation: Generation,
    outgoing: Mutex<Option<mpsc::UnboundedSender<BattleRequest>>>,
    events: EventSender<BattleEvent>,
}

impl WsBattleSocket {
    /// Create a socket for the service at `url`.
    pub fn new(url: impl Into<String>) -> (Self, EventReceiver<BattleEvent>) {
        let (events, rx) = event_queue();
        let socket = Self {
            url: url.into(),
            generation: Generation::default(),
            outgoing: Mutex::new(None),
            events,
        };
        (socket, rx)
    }
}

#[async_trait]
impl BattleSocket for WsBattleSocket {
    async fn connect(
        &self,
        session_id: &SessionId,
        display_name: &str,
        player_id: &str,
    ) -> Result<(), SocketError> {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(BattleRequest::Join {
            session_id: hex::encode(session_id),
            player_id: player_id.to_string(),
            display_name: display_name.to_string(),
        })
        .map_err(|_| SocketError::Closed)?;
        *self.outgoing.lock() = Some(tx);
        let current = self.generation.advance();

        let generation = self.generation.clone();
        let events = self.events.clone();
        spawn_connection(self.url.clone(), rx, move |signal| match signal {
            _ if !generation.is_current(current) => {
                debug!("Dropping signal from retired battle connection {}", current);
            }
            Signal::Opened => {}
            Signal::Text(text) => match BattleNotice::from_json(&text) {
                Ok(notice) => {
                    let _ = events.send(BattleEvent::from(notice));
                }
                Err(e) => debug!("Invalid battle notice: {}", e),
            },
            Signal::Closed(reason) => {
                let reason = reason.unwrap_or_else(|| "connection closed".to_string());
                let _ = events.send(BattleEvent::ConnectionLost { reason });
            }
        });

        info!("Joining battle {} at {}", hex::encode(session_id), self.url);
        Ok(())
    }

    async fn send_word_path(&self, path: &WordPath) -> Result<(), SocketError> {
        queue(&self.outgoing, BattleRequest::WordPath { path: path.clone() })
    }

    async fn leave_game(&self) -> Result<(), SocketError> {
        let tx = self.outgoing.lock().take();
        self.generation.advance();
        match tx {
            Some(tx) => tx.send(BattleRequest::LeaveGame).map_err(|_| SocketError::Closed),
            None => Err(SocketError::Closed),
        }
    }
}
