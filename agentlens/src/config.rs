//! Runtime configuration for the proxy and its two listeners.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

pub const DEFAULT_WS_PORT: u16 = 6381;
pub const DEFAULT_API_PORT: u16 = 6382;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Address both listeners bind to.
    pub host: IpAddr,
    /// Live push (WebSocket) port.
    pub ws_port: u16,
    /// Query API port.
    pub api_port: u16,
    pub db_path: PathBuf,
    /// Bind the listeners at all; recording happens either way.
    pub serve: bool,
}

impl ProxyConfig {
    pub fn with_db_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            ws_port: DEFAULT_WS_PORT,
            api_port: DEFAULT_API_PORT,
            db_path: db_path.into(),
            serve: true,
        }
    }

    pub const fn ws_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.ws_port)
    }

    pub const fn api_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.api_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_loopback() {
        let config = ProxyConfig::with_db_path("/tmp/sessions.db");
        assert_eq!(config.ws_addr().to_string(), "127.0.0.1:6381");
        assert_eq!(config.api_addr().to_string(), "127.0.0.1:6382");
        assert!(config.serve);
    }
}
