//! Database module for `SQLite` operations.

mod connection;
mod queries;
mod store;

pub use connection::Database;
pub use queries::{MessageQueries, SessionQueries};
pub use store::SessionStore;
