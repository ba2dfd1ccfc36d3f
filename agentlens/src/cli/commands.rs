//! CLI command execution.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::CommandFactory;

use crate::broadcast::Broadcaster;
use crate::db::{Database, SessionStore};
use crate::process::ProcessOptions;
use crate::proxy::{Supervisor, FAILURE_EXIT_CODE};
use crate::server;

use super::args::Cli;

/// Time given to observers to receive the final events before sockets close.
const DELIVERY_GRACE: Duration = Duration::from_millis(200);

const SERVER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Run one proxied session. Returns the exit code for the proxy process.
pub async fn execute(cli: Cli) -> Result<i32> {
    let Some(options) = ProcessOptions::from_command_line(&cli.command) else {
        eprintln!("{}", Cli::command().render_help());
        return Ok(FAILURE_EXIT_CODE);
    };

    let config = cli.config()?;
    let db = Database::open_at(&config.db_path)
        .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?;
    let store = SessionStore::new(db);
    let broadcaster = Broadcaster::default();
    tracing::debug!(db = %config.db_path.display(), "session database ready");

    let servers = if config.serve {
        let servers = server::start(&config, store.clone(), broadcaster.clone()).await;
        if servers.listener_count() == 0 {
            tracing::warn!("no servers listening, recording to the database only");
        }
        Some(servers)
    } else {
        None
    };

    let supervisor = Supervisor::new(store, broadcaster.clone());
    let outcome = supervisor
        .run(&options, tokio::io::stdin(), tokio::io::stdout())
        .await;

    tokio::time::sleep(DELIVERY_GRACE).await;
    broadcaster.close();
    if let Some(servers) = servers {
        if tokio::time::timeout(SERVER_SHUTDOWN_TIMEOUT, servers.shutdown())
            .await
            .is_err()
        {
            tracing::warn!("servers did not stop in time");
        }
    }

    let outcome = outcome?;
    tracing::info!(
        session_id = %outcome.session_id,
        status = %outcome.status,
        exit_code = ?outcome.exit_code,
        "session ended"
    );
    Ok(outcome.process_exit_code())
}
