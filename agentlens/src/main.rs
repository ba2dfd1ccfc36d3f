//! AgentLens - a transparent stdio proxy that records JSON-RPC sessions.
//!
//! Architecture:
//! - The proxy spawns the server command and forwards stdin/stdout byte for byte
//! - A recorder task frames, classifies and times every message, then
//!   persists it to SQLite (~/.agentlens/sessions.db)
//! - Recorded messages are pushed live over WebSocket and queryable over HTTP

mod broadcast;
mod cli;
mod config;
mod db;
mod error;
mod models;
mod process;
mod protocol;
mod proxy;
mod server;
mod tracker;
mod truncate;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{execute, Cli};

#[tokio::main]
async fn main() {
    // stdout carries the proxied protocol, so diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("agentlens=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match execute(cli).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            proxy::FAILURE_EXIT_CODE
        }
    };

    // Exit without waiting on the blocking stdin reader.
    std::process::exit(code);
}
