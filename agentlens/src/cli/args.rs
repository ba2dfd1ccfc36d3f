//! CLI argument definitions.

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::config::{ProxyConfig, DEFAULT_API_PORT, DEFAULT_WS_PORT};
use crate::db::Database;

/// AgentLens - record and replay a stdio JSON-RPC server session
#[derive(Parser, Debug)]
#[command(name = "agentlens")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "Examples:\n  \
    agentlens -- node server.js\n  \
    agentlens --api-port 7000 -- python -m my_server --verbose")]
pub struct Cli {
    /// Address the live and query servers bind to
    #[arg(long, env = "AGENTLENS_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port for the live WebSocket feed
    #[arg(long, env = "AGENTLENS_WS_PORT", default_value_t = DEFAULT_WS_PORT)]
    pub ws_port: u16,

    /// Port for the query API
    #[arg(long, env = "AGENTLENS_API_PORT", default_value_t = DEFAULT_API_PORT)]
    pub api_port: u16,

    /// Session database (default: ~/.agentlens/sessions.db)
    #[arg(long, env = "AGENTLENS_DB")]
    pub db: Option<PathBuf>,

    /// Record only; do not start the live or query servers
    #[arg(long, env = "AGENTLENS_NO_SERVERS")]
    pub no_servers: bool,

    /// Server command to run, with its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl Cli {
    pub fn config(&self) -> Result<ProxyConfig> {
        let db_path = match &self.db {
            Some(path) => path.clone(),
            None => Database::default_path()?,
        };
        Ok(ProxyConfig {
            host: self.host,
            ws_port: self.ws_port,
            api_port: self.api_port,
            serve: !self.no_servers,
            ..ProxyConfig::with_db_path(db_path)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("agentlens").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn command_after_double_dash() {
        let cli = parse(&["--", "node", "server.js", "--port", "3000"]);
        assert_eq!(cli.command, ["node", "server.js", "--port", "3000"]);
    }

    #[test]
    fn command_without_double_dash() {
        let cli = parse(&["--ws-port", "7001", "python", "-m", "server"]);
        assert_eq!(cli.ws_port, 7001);
        assert_eq!(cli.command, ["python", "-m", "server"]);
    }

    #[test]
    fn flags_after_command_belong_to_it() {
        let cli = parse(&["node", "--no-servers"]);
        assert!(!cli.no_servers);
        assert_eq!(cli.command, ["node", "--no-servers"]);
    }

    #[test]
    fn missing_command_parses_empty() {
        assert!(parse(&[]).command.is_empty());
    }

    #[test]
    fn config_from_flags() {
        let cli = parse(&["--db", "/tmp/x.db", "--no-servers", "--api-port", "9000", "--", "cat"]);
        let config = cli.config().unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/x.db"));
        assert!(!config.serve);
        assert_eq!(config.api_addr().port(), 9000);
        assert_eq!(config.ws_addr().port(), DEFAULT_WS_PORT);
    }
}
