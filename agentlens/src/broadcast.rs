//! Best-effort fan-out of live events to observers.
//!
//! Built on a bounded `tokio::sync::broadcast` ring: publishing never
//! waits on observers. An observer that falls more than the ring capacity
//! behind skips the events it missed; an observer whose socket fails simply
//! drops its subscription.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, watch};

use crate::models::{Direction, Message, SessionStatus};
use crate::truncate;

/// Default ring capacity per observer.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Frame pushed to observers: `{ "event": ..., "data": { ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum LiveEvent {
    Message(MessageEvent),
    SessionEnd(SessionEndEvent),
}

/// A recorded message with its payload cut to the preview bound.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageEvent {
    pub id: i64,
    pub session_id: String,
    pub direction: Direction,
    pub timestamp: i64,
    pub raw_payload: String,
    pub method: Option<String>,
    pub is_error: bool,
    pub latency_ms: Option<i64>,
}

impl From<&Message> for MessageEvent {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            session_id: message.session_id.clone(),
            direction: message.direction,
            timestamp: message.timestamp,
            raw_payload: truncate::for_preview(&message.raw_payload),
            method: message.method.clone(),
            is_error: message.is_error,
            latency_ms: message.latency_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionEndEvent {
    pub session_id: String,
    /// Child exit code; `None` when it never started or died by signal.
    pub code: Option<i32>,
    pub status: SessionStatus,
}

/// Publish/subscribe hub shared by the recorder and the WebSocket server.
#[derive(Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<LiveEvent>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        let (shutdown, _) = watch::channel(false);
        Self {
            tx,
            shutdown: Arc::new(shutdown),
        }
    }

    /// Register a new observer.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            shutdown: self.shutdown.subscribe(),
        }
    }

    /// Remove an observer from the subscriber set.
    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    /// Publish to every current observer. Returns how many were reached.
    pub fn publish(&self, event: LiveEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// End every subscription; observers see the end of their stream.
    pub fn close(&self) {
        self.shutdown.send_replace(true);
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// One observer's view of the event stream.
pub struct Subscription {
    rx: broadcast::Receiver<LiveEvent>,
    shutdown: watch::Receiver<bool>,
}

impl Subscription {
    /// Next event in publish order, or `None` once the broadcaster closes
    /// and everything published before the close has been read.
    pub async fn next(&mut self) -> Option<LiveEvent> {
        loop {
            if *self.shutdown.borrow() {
                return self.drain();
            }
            tokio::select! {
                biased;
                _ = async { self.shutdown.wait_for(|closed| *closed).await.map(|_| ()) } => return self.drain(),
                received = self.rx.recv() => match received {
                    Ok(event) => return Some(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "observer lagged behind, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
            }
        }
    }

    /// Take what is already queued without waiting.
    fn drain(&mut self) -> Option<LiveEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "observer lagged behind, events dropped");
                }
                Err(_) => return None,
            }
        }
    }
}
