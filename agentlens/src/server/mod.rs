//! HTTP listeners: the query API and the live push socket.
//!
//! Each runs on its own port. A port that cannot be bound is logged and
//! skipped; the proxy keeps recording without it.

mod api;
mod ws;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::broadcast::Broadcaster;
use crate::config::ProxyConfig;
use crate::db::SessionStore;

pub use api::router as api_router;
pub use ws::router as ws_router;

/// Running listeners; dropping it leaves them running until the runtime ends.
pub struct ServerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn listener_count(&self) -> usize {
        self.tasks.len()
    }

    /// Stop accepting and wait for open connections to drain.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

/// Bind both listeners and serve them in the background.
pub async fn start(
    config: &ProxyConfig,
    store: SessionStore,
    broadcaster: Broadcaster,
) -> ServerHandle {
    let (shutdown, _) = watch::channel(false);
    let mut tasks = Vec::new();

    let listeners = [
        ("live", config.ws_addr(), ws_router(broadcaster), "ws"),
        ("api", config.api_addr(), api_router(store), "http"),
    ];
    for (name, addr, app, scheme) in listeners {
        match bind(addr).await {
            Ok(listener) => {
                tracing::info!("{name} server listening on {scheme}://{addr}");
                tasks.push(tokio::spawn(serve(name, listener, app, shutdown.subscribe())));
            }
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "{name} server unavailable, continuing without it");
            }
        }
    }

    ServerHandle { shutdown, tasks }
}

async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))
}

async fn serve(name: &'static str, listener: TcpListener, app: Router, mut shutdown: watch::Receiver<bool>) {
    let signal = async move {
        let _ = shutdown.wait_for(|stop| *stop).await;
    };
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .await
    {
        tracing::error!(error = %err, "{name} server error");
    }
}
