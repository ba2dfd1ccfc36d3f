//! Pending-request bookkeeping for latency and method recovery.
//!
//! One tracker belongs to one session. Entries are keyed only by the
//! protocol's correlation id: registering an id that is still pending
//! replaces the earlier entry, and entries that never get a response stay
//! until the session ends.

use std::collections::HashMap;

use crate::protocol::CorrelationId;

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingRequest {
    method: String,
    sent_at: i64,
}

/// Outcome of matching a response against the pending set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Correlation {
    pub method: Option<String>,
    pub latency_ms: Option<i64>,
    pub matched: bool,
}

#[derive(Debug, Default)]
pub struct CorrelationTracker {
    pending: HashMap<CorrelationId, PendingRequest>,
}

impl CorrelationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client request sent at `now` (ms). Last writer wins.
    pub fn on_request(&mut self, id: CorrelationId, method: &str, now: i64) {
        let previous = self.pending.insert(
            id,
            PendingRequest {
                method: method.to_string(),
                sent_at: now,
            },
        );
        if let Some(previous) = previous {
            tracing::debug!(method = %previous.method, "pending request replaced by id reuse");
        }
    }

    /// Resolve a server response received at `now` (ms).
    pub fn on_response(&mut self, id: &CorrelationId, now: i64) -> Correlation {
        match self.pending.remove(id) {
            Some(pending) => Correlation {
                method: Some(pending.method),
                latency_ms: Some(now - pending.sent_at),
                matched: true,
            },
            None => Correlation::default(),
        }
    }

    /// Number of requests still awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(value: &serde_json::Value) -> CorrelationId {
        CorrelationId::from_value(value).unwrap()
    }

    #[test]
    fn matches_response_and_computes_latency() {
        let mut tracker = CorrelationTracker::new();
        tracker.on_request(id(&json!(1)), "search", 1_000);

        let correlation = tracker.on_response(&id(&json!(1)), 1_120);
        assert_eq!(
            correlation,
            Correlation {
                method: Some("search".to_string()),
                latency_ms: Some(120),
                matched: true,
            }
        );
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn unmatched_response_has_no_metadata() {
        let mut tracker = CorrelationTracker::new();
        let correlation = tracker.on_response(&id(&json!(7)), 50);
        assert!(!correlation.matched);
        assert_eq!(correlation.method, None);
        assert_eq!(correlation.latency_ms, None);
    }

    #[test]
    fn response_resolves_only_once() {
        let mut tracker = CorrelationTracker::new();
        tracker.on_request(id(&json!("a")), "ping", 0);
        assert!(tracker.on_response(&id(&json!("a")), 5).matched);
        assert!(!tracker.on_response(&id(&json!("a")), 6).matched);
    }

    #[test]
    fn reused_id_resolves_against_latest_registration() {
        let mut tracker = CorrelationTracker::new();
        tracker.on_request(id(&json!(1)), "first", 100);
        tracker.on_request(id(&json!(1)), "second", 400);
        assert_eq!(tracker.pending_count(), 1);

        let correlation = tracker.on_response(&id(&json!(1)), 500);
        assert_eq!(correlation.method.as_deref(), Some("second"));
        assert_eq!(correlation.latency_ms, Some(100));
        assert!(!tracker.on_response(&id(&json!(1)), 600).matched);
    }

    #[test]
    fn unanswered_requests_stay_pending() {
        let mut tracker = CorrelationTracker::new();
        tracker.on_request(id(&json!(1)), "a", 0);
        tracker.on_request(id(&json!(2)), "b", 0);
        tracker.on_response(&id(&json!(2)), 10);
        assert_eq!(tracker.pending_count(), 1);
    }
}
