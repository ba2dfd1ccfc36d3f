//! Shared handle over the session database.
//!
//! The recorder and the HTTP handlers run on different tasks, so every
//! operation takes the connection lock for exactly one statement or
//! transaction. Callers never hold the lock across an await point.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use super::{Database, MessageQueries, SessionQueries};
use crate::error::StoreError;
use crate::models::{Message, NewMessage, Session, SessionStatus};

#[derive(Clone)]
pub struct SessionStore {
    db: Arc<Mutex<Database>>,
}

impl SessionStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>, StoreError> {
        self.db.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Create an active session started now.
    pub fn create_session(&self, id: &str, command: &str) -> Result<(), StoreError> {
        let db = self.lock()?;
        SessionQueries::insert(db.conn(), id, command, Utc::now().timestamp_millis())
    }

    /// Append a message, updating the session counters atomically.
    pub fn append_message(&self, message: &NewMessage<'_>) -> Result<Message, StoreError> {
        let db = self.lock()?;
        MessageQueries::append(db.conn(), message)
    }

    /// Record the terminal status. Unknown ids are ignored; repeated calls
    /// overwrite the terminal fields.
    pub fn end_session(&self, id: &str, status: SessionStatus) -> Result<(), StoreError> {
        debug_assert!(status.is_terminal());
        let db = self.lock()?;
        let touched = SessionQueries::end(db.conn(), id, status, Utc::now().timestamp_millis())?;
        if touched == 0 {
            tracing::debug!(session_id = id, "end requested for unknown session");
        }
        Ok(())
    }

    pub fn list_sessions(&self) -> Result<Vec<Session>, StoreError> {
        let db = self.lock()?;
        SessionQueries::list(db.conn())
    }

    pub fn get_session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let db = self.lock()?;
        SessionQueries::get_by_id(db.conn(), id)
    }

    /// Messages of a session ordered by sequence id.
    pub fn get_messages(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        let db = self.lock()?;
        MessageQueries::list_for_session(db.conn(), session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;
    use crate::truncate::{STORAGE_LIMIT, STORAGE_MARKER};

    fn store() -> SessionStore {
        SessionStore::new(Database::open_in_memory().unwrap())
    }

    fn new_message<'a>(
        session_id: &'a str,
        direction: Direction,
        raw_frame: &'a str,
        is_error: bool,
    ) -> NewMessage<'a> {
        NewMessage {
            session_id,
            direction,
            timestamp: 1_000,
            raw_frame,
            method: Some("tools/call"),
            is_error,
            latency_ms: None,
        }
    }

    #[test]
    fn create_and_get_session() {
        let store = store();
        store.create_session("abc12345", "node server.js").unwrap();

        let session = store.get_session("abc12345").unwrap().unwrap();
        assert_eq!(session.command, "node server.js");
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.ended_at, None);
        assert_eq!(session.total_messages, 0);
        assert!(session.started_at > 0);

        assert!(store.get_session("missing").unwrap().is_none());
    }

    #[test]
    fn duplicate_session_id_is_rejected() {
        let store = store();
        store.create_session("dup", "a").unwrap();
        let err = store.create_session("dup", "b").unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(id) if id == "dup"));
    }

    #[test]
    fn append_assigns_increasing_ids_and_counts() {
        let store = store();
        store.create_session("s", "cat").unwrap();

        let first = store
            .append_message(&new_message("s", Direction::ClientToServer, "{}", false))
            .unwrap();
        let second = store
            .append_message(&new_message("s", Direction::ServerToClient, "{}", true))
            .unwrap();
        let third = store
            .append_message(&new_message("s", Direction::ServerToClient, "{}", false))
            .unwrap();
        assert!(first.id < second.id && second.id < third.id);

        let session = store.get_session("s").unwrap().unwrap();
        assert_eq!(session.total_messages, 3);
        assert_eq!(session.error_count, 1);

        let ids: Vec<i64> = store.get_messages("s").unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![first.id, second.id, third.id]);
    }

    #[test]
    fn append_requires_existing_session() {
        let store = store();
        let result = store.append_message(&new_message("ghost", Direction::ClientToServer, "{}", false));
        assert!(result.is_err());
        assert!(store.get_messages("ghost").unwrap().is_empty());
    }

    #[test]
    fn oversized_payload_is_truncated_but_counted() {
        let store = store();
        store.create_session("s", "cat").unwrap();

        let big = format!("{{\"id\":1,\"error\":\"{}\"}}", "x".repeat(STORAGE_LIMIT));
        let stored = store
            .append_message(&new_message("s", Direction::ServerToClient, &big, true))
            .unwrap();
        assert!(stored.raw_payload.ends_with(STORAGE_MARKER));
        assert!(stored.is_error);

        let loaded = &store.get_messages("s").unwrap()[0];
        assert_eq!(loaded.raw_payload, stored.raw_payload);

        let session = store.get_session("s").unwrap().unwrap();
        assert_eq!(session.total_messages, 1);
        assert_eq!(session.error_count, 1);
    }

    #[test]
    fn end_session_sets_terminal_fields_and_is_repeatable() {
        let store = store();
        store.create_session("s", "cat").unwrap();

        store.end_session("s", SessionStatus::Completed).unwrap();
        let ended = store.get_session("s").unwrap().unwrap();
        assert_eq!(ended.status, SessionStatus::Completed);
        assert!(ended.ended_at.is_some());

        store.end_session("s", SessionStatus::Error).unwrap();
        assert_eq!(
            store.get_session("s").unwrap().unwrap().status,
            SessionStatus::Error
        );

        store.end_session("unknown", SessionStatus::Error).unwrap();
    }

    #[test]
    fn sessions_listed_newest_first() {
        let store = store();
        {
            let db = store.lock().unwrap();
            SessionQueries::insert(db.conn(), "old", "a", 100).unwrap();
            SessionQueries::insert(db.conn(), "new", "b", 300).unwrap();
            SessionQueries::insert(db.conn(), "mid", "c", 200).unwrap();
        }
        let ids: Vec<String> = store
            .list_sessions()
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn messages_keep_null_fields() {
        let store = store();
        store.create_session("s", "cat").unwrap();
        store
            .append_message(&NewMessage {
                session_id: "s",
                direction: Direction::ServerToClient,
                timestamp: 5,
                raw_frame: r#"{"id":3,"result":{}}"#,
                method: None,
                is_error: false,
                latency_ms: None,
            })
            .unwrap();
        let message = &store.get_messages("s").unwrap()[0];
        assert_eq!(message.method, None);
        assert_eq!(message.latency_ms, None);
        assert_eq!(message.direction, Direction::ServerToClient);
    }
}
