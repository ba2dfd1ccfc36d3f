//! Database query implementations.

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use crate::error::StoreError;
use crate::models::{Direction, Message, NewMessage, Session, SessionStatus};
use crate::truncate;

/// Queries for the sessions table.
pub struct SessionQueries;

impl SessionQueries {
    /// Insert a new active session.
    pub fn insert(
        conn: &Connection,
        id: &str,
        command: &str,
        started_at: i64,
    ) -> Result<(), StoreError> {
        let result = conn.execute(
            "INSERT INTO sessions (id, command, started_at, status) VALUES (?1, ?2, ?3, ?4)",
            params![id, command, started_at, SessionStatus::Active.as_str()],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::AlreadyExists(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Set the terminal fields. Returns the number of rows touched.
    pub fn end(
        conn: &Connection,
        id: &str,
        status: SessionStatus,
        ended_at: i64,
    ) -> Result<usize, StoreError> {
        Ok(conn.execute(
            "UPDATE sessions SET ended_at = ?1, status = ?2 WHERE id = ?3",
            params![ended_at, status.as_str(), id],
        )?)
    }

    /// Get a session by ID.
    pub fn get_by_id(conn: &Connection, id: &str) -> Result<Option<Session>, StoreError> {
        let mut stmt = conn.prepare(
            r"SELECT id, command, started_at, ended_at, status, total_messages, error_count
              FROM sessions WHERE id = ?1",
        )?;

        stmt.query_row(params![id], |row| Ok(Self::row_to_session(row)))
            .optional()?
            .transpose()
    }

    /// List sessions, most recently started first.
    pub fn list(conn: &Connection) -> Result<Vec<Session>, StoreError> {
        let mut stmt = conn.prepare(
            r"SELECT id, command, started_at, ended_at, status, total_messages, error_count
              FROM sessions ORDER BY started_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map([], |row| Ok(Self::row_to_session(row)))?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row??);
        }
        Ok(sessions)
    }

    /// Convert a row to a Session.
    fn row_to_session(row: &rusqlite::Row<'_>) -> Result<Session, StoreError> {
        let status_str: String = row.get(4)?;
        let status = SessionStatus::from_str(&status_str).ok_or(StoreError::InvalidValue {
            column: "status",
            value: status_str,
        })?;

        Ok(Session {
            id: row.get(0)?,
            command: row.get(1)?,
            started_at: row.get(2)?,
            ended_at: row.get(3)?,
            status,
            total_messages: row.get(5)?,
            error_count: row.get(6)?,
        })
    }
}

/// Queries for the messages table.
pub struct MessageQueries;

impl MessageQueries {
    /// Append a message and bump the session counters in one transaction.
    ///
    /// The payload is truncated for storage here, after classification has
    /// already happened on the full frame.
    pub fn append(conn: &Connection, message: &NewMessage<'_>) -> Result<Message, StoreError> {
        let raw_payload = truncate::for_storage(message.raw_frame);

        let tx = conn.unchecked_transaction()?;
        tx.execute(
            r"INSERT INTO messages (session_id, direction, timestamp, raw_payload, method, is_error, latency_ms)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                message.session_id,
                message.direction.as_str(),
                message.timestamp,
                raw_payload,
                message.method,
                message.is_error,
                message.latency_ms,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
            r"UPDATE sessions
              SET total_messages = total_messages + 1, error_count = error_count + ?1
              WHERE id = ?2",
            params![i64::from(message.is_error), message.session_id],
        )?;
        tx.commit()?;

        Ok(Message {
            id,
            session_id: message.session_id.to_string(),
            direction: message.direction,
            timestamp: message.timestamp,
            raw_payload,
            method: message.method.map(str::to_string),
            is_error: message.is_error,
            latency_ms: message.latency_ms,
        })
    }

    /// List a session's messages in insertion order.
    pub fn list_for_session(
        conn: &Connection,
        session_id: &str,
    ) -> Result<Vec<Message>, StoreError> {
        let mut stmt = conn.prepare(
            r"SELECT id, session_id, direction, timestamp, raw_payload, method, is_error, latency_ms
              FROM messages WHERE session_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![session_id], |row| Ok(Self::row_to_message(row)))?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row??);
        }
        Ok(messages)
    }

    /// Convert a row to a Message.
    fn row_to_message(row: &rusqlite::Row<'_>) -> Result<Message, StoreError> {
        let direction_str: String = row.get(2)?;
        let direction =
            Direction::from_str(&direction_str).ok_or(StoreError::InvalidValue {
                column: "direction",
                value: direction_str,
            })?;

        Ok(Message {
            id: row.get(0)?,
            session_id: row.get(1)?,
            direction,
            timestamp: row.get(3)?,
            raw_payload: row.get(4)?,
            method: row.get(5)?,
            is_error: row.get(6)?,
            latency_ms: row.get(7)?,
        })
    }
}
