//! Data models for recorded sessions.

mod message;
mod session;
mod tool_call;

pub use message::{Direction, Message, NewMessage};
pub use session::{generate_session_id, Session, SessionStatus};
pub use tool_call::{pair_messages, SessionStats, ToolCall};
