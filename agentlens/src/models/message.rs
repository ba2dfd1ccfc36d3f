//! Message model: one row per classified protocol frame.

use serde::{Deserialize, Serialize};

/// Which pipe a frame was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Host stdin to child stdin.
    ClientToServer,
    /// Child stdout to host stdout.
    ServerToClient,
}

impl Direction {
    /// Convert direction to string for database storage.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClientToServer => "client_to_server",
            Self::ServerToClient => "server_to_client",
        }
    }

    /// Parse direction from database string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "client_to_server" => Some(Self::ClientToServer),
            "server_to_client" => Some(Self::ServerToClient),
            _ => None,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recorded protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Insertion sequence id assigned by the store.
    pub id: i64,
    pub session_id: String,
    pub direction: Direction,
    /// Capture time at the proxy, in milliseconds.
    pub timestamp: i64,
    /// Frame text, truncated with a marker above the storage ceiling.
    pub raw_payload: String,
    /// Method name, direct or recovered through correlation.
    pub method: Option<String>,
    pub is_error: bool,
    /// Present only on responses matched to a pending request.
    pub latency_ms: Option<i64>,
}

/// A message about to be appended; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage<'a> {
    pub session_id: &'a str,
    pub direction: Direction,
    pub timestamp: i64,
    pub raw_frame: &'a str,
    pub method: Option<&'a str>,
    pub is_error: bool,
    pub latency_ms: Option<i64>,
}
