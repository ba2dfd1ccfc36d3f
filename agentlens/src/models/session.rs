//! Session model: one row per proxy invocation.

use serde::{Deserialize, Serialize};

/// Status of a recorded session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Child process is running.
    Active,
    /// Child exited with status zero.
    Completed,
    /// Child failed to spawn or exited abnormally.
    Error,
}

impl SessionStatus {
    /// Convert status to string for database storage.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Parse status from database string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Whether this status ends a session.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recorded proxy session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Short opaque identifier.
    pub id: String,
    /// Child command line, joined with spaces.
    pub command: String,
    /// Start time in milliseconds since the Unix epoch.
    pub started_at: i64,
    /// End time in milliseconds, set once at the terminal transition.
    pub ended_at: Option<i64>,
    pub status: SessionStatus,
    pub total_messages: i64,
    pub error_count: i64,
}

/// Generate a short session id (first 8 hex chars of a random UUID).
pub fn generate_session_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}
