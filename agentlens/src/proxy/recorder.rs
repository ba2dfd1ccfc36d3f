//! The observe/record path for one session.
//!
//! Byte pumps hand copies of what they forwarded to a single recorder task.
//! That task is the only writer for the session's splitters, pending map
//! and message log, so per-direction arrival order is the order frames are
//! stored and broadcast.

use tokio::sync::mpsc;

use crate::broadcast::{Broadcaster, LiveEvent, MessageEvent};
use crate::db::SessionStore;
use crate::error::StoreError;
use crate::models::{Direction, Message, NewMessage};
use crate::protocol::{classify, Classified, FrameSplitter};
use crate::tracker::CorrelationTracker;

/// A chunk of bytes observed on one pipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observed {
    pub direction: Direction,
    pub bytes: Vec<u8>,
    /// Arrival time at the proxy, in milliseconds.
    pub at: i64,
}

pub struct Recorder {
    session_id: String,
    store: SessionStore,
    broadcaster: Broadcaster,
    tracker: CorrelationTracker,
    client_frames: FrameSplitter,
    server_frames: FrameSplitter,
}

impl Recorder {
    pub fn new(session_id: impl Into<String>, store: SessionStore, broadcaster: Broadcaster) -> Self {
        Self {
            session_id: session_id.into(),
            store,
            broadcaster,
            tracker: CorrelationTracker::new(),
            client_frames: FrameSplitter::new(),
            server_frames: FrameSplitter::new(),
        }
    }

    /// Feed an observed chunk through its direction's splitter and record
    /// every frame it completes. Returns how many messages were stored.
    pub fn observe(&mut self, chunk: &Observed) -> Result<usize, StoreError> {
        let frames = match chunk.direction {
            Direction::ClientToServer => self.client_frames.feed(&chunk.bytes),
            Direction::ServerToClient => self.server_frames.feed(&chunk.bytes),
        };

        let mut recorded = 0;
        for frame in frames {
            if self.record_frame(chunk.direction, &frame, chunk.at)?.is_some() {
                recorded += 1;
            }
        }
        Ok(recorded)
    }

    /// Classify, correlate, store and broadcast a single frame.
    ///
    /// Unparseable frames are skipped and yield `Ok(None)`.
    pub fn record_frame(
        &mut self,
        direction: Direction,
        frame: &str,
        at: i64,
    ) -> Result<Option<Message>, StoreError> {
        let Some(classified) = classify(frame) else {
            tracing::trace!(%direction, "skipping unparseable frame");
            return Ok(None);
        };

        let mut method = classified.method().map(str::to_string);
        let mut latency_ms = None;

        match (&classified, direction) {
            (Classified::Request { id, method }, Direction::ClientToServer) => {
                self.tracker.on_request(id.clone(), method, at);
            }
            (Classified::Response { id, .. }, Direction::ServerToClient) => {
                let correlation = self.tracker.on_response(id, at);
                if !correlation.matched {
                    tracing::debug!(id = %id, "response without pending request");
                }
                method = correlation.method;
                latency_ms = correlation.latency_ms;
            }
            _ => {}
        }

        let message = self.store.append_message(&NewMessage {
            session_id: &self.session_id,
            direction,
            timestamp: at,
            raw_frame: frame,
            method: method.as_deref(),
            is_error: classified.is_error(),
            latency_ms,
        })?;

        self.broadcaster
            .publish(LiveEvent::Message(MessageEvent::from(&message)));
        Ok(Some(message))
    }

    pub fn pending_requests(&self) -> usize {
        self.tracker.pending_count()
    }

    /// Bytes of incomplete frames still held back, per direction.
    pub fn unterminated_bytes(&self) -> (usize, usize) {
        (self.client_frames.pending(), self.server_frames.pending())
    }
}

/// Drain observed chunks until every pump has hung up.
///
/// A storage failure stops recording and is returned to the supervisor.
pub async fn run(
    mut recorder: Recorder,
    mut observed: mpsc::UnboundedReceiver<Observed>,
) -> Result<Recorder, StoreError> {
    while let Some(chunk) = observed.recv().await {
        recorder.observe(&chunk)?;
    }
    Ok(recorder)
}
