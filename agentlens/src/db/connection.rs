//! Database connection management.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Directory under the home directory holding the session database.
const DATA_DIR: &str = ".agentlens";
const DB_FILE: &str = "sessions.db";

/// SQLite connection holding the `sessions` and `messages` tables.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Default database location, `~/.agentlens/sessions.db`.
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(DATA_DIR).join(DB_FILE))
    }

    /// Open or create the database at a specific path, creating parent directories.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;

        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize pragmas and schema.
    fn initialize(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                command TEXT NOT NULL,
                started_at INTEGER NOT NULL,
                ended_at INTEGER,
                status TEXT NOT NULL DEFAULT 'active',
                total_messages INTEGER NOT NULL DEFAULT 0,
                error_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                direction TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                raw_payload TEXT NOT NULL,
                method TEXT,
                is_error INTEGER NOT NULL DEFAULT 0,
                latency_ms INTEGER,
                FOREIGN KEY (session_id) REFERENCES sessions(id)
            );

            CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id);
            CREATE INDEX IF NOT EXISTS idx_messages_error ON messages(session_id, is_error) WHERE is_error = 1;
            ",
            )
            .context("Failed to initialize database schema")?;
        Ok(())
    }

    /// Get a reference to the connection.
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }
}
