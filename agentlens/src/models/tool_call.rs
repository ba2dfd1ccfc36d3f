//! Request/response pairing derived from the message log on read.
//!
//! Nothing here is persisted: pairs are rebuilt from the correlation ids
//! embedded in the stored payloads every time a consumer asks.

use std::collections::HashMap;

use serde::Serialize;

use super::{Direction, Message, Session};
use crate::protocol::{classify, Classified, CorrelationId};
use crate::truncate::STORAGE_MARKER;

/// A client request paired with the server response sharing its id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    /// Display id, `call-<sequence_index>`.
    pub id: String,
    pub method: String,
    pub request: Message,
    pub response: Option<Message>,
    pub latency_ms: Option<i64>,
    pub is_error: bool,
    pub sequence_index: usize,
}

/// Pair every client request with its response.
///
/// Responses are indexed by the id parsed from their payload; when two
/// responses share an id the later one wins. Requests are emitted in
/// sequence order regardless of how the two directions interleaved.
pub fn pair_messages(messages: &[Message]) -> Vec<ToolCall> {
    let mut responses: HashMap<CorrelationId, &Message> = HashMap::new();
    for message in messages
        .iter()
        .filter(|m| m.direction == Direction::ServerToClient)
    {
        if let Some(Classified::Response { id, .. }) = classify(&message.raw_payload) {
            responses.insert(id, message);
        }
    }

    let mut calls = Vec::new();
    for request in messages
        .iter()
        .filter(|m| m.direction == Direction::ClientToServer)
    {
        let id = match classify(&request.raw_payload) {
            Some(Classified::Request { id, .. }) => Some(id),
            // A request stored truncated no longer parses; keep it unpaired.
            None if request.method.is_some()
                && request.raw_payload.ends_with(STORAGE_MARKER) =>
            {
                None
            }
            _ => continue,
        };

        let response = id.and_then(|id| responses.get(&id).copied().cloned());
        let sequence_index = calls.len();
        calls.push(ToolCall {
            id: format!("call-{sequence_index}"),
            method: request
                .method
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            latency_ms: response.as_ref().and_then(|r| r.latency_ms),
            is_error: response.as_ref().is_some_and(|r| r.is_error),
            request: request.clone(),
            response,
            sequence_index,
        });
    }

    calls
}

/// Summary figures for one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub tool_calls: usize,
    pub errors: usize,
    /// Mean over calls that have a latency; zero when none do.
    pub avg_latency_ms: f64,
    pub duration_ms: i64,
}

impl SessionStats {
    /// Compute stats; `now_ms` stands in for `ended_at` on active sessions.
    #[allow(clippy::cast_precision_loss)]
    pub fn compute(session: &Session, calls: &[ToolCall], now_ms: i64) -> Self {
        let latencies: Vec<i64> = calls.iter().filter_map(|c| c.latency_ms).collect();
        let avg_latency_ms = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<i64>() as f64 / latencies.len() as f64
        };

        Self {
            tool_calls: calls.len(),
            errors: calls.iter().filter(|c| c.is_error).count(),
            avg_latency_ms,
            duration_ms: session.ended_at.unwrap_or(now_ms) - session.started_at,
        }
    }
}
