//! Termination signals received by the proxy, relayed to the child.

use anyhow::{Context, Result};

/// Signals the proxy relays to its child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forwarded {
    Interrupt,
    Terminate,
}

#[cfg(unix)]
impl From<Forwarded> for nix::sys::signal::Signal {
    fn from(signal: Forwarded) -> Self {
        match signal {
            Forwarded::Interrupt => Self::SIGINT,
            Forwarded::Terminate => Self::SIGTERM,
        }
    }
}

/// Listener for SIGINT and SIGTERM.
pub struct SignalListener {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl SignalListener {
    #[cfg(unix)]
    pub fn new() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt()).context("Failed to listen for SIGINT")?,
            terminate: signal(SignalKind::terminate()).context("Failed to listen for SIGTERM")?,
        })
    }

    #[cfg(not(unix))]
    pub fn new() -> Result<Self> {
        Ok(Self {})
    }

    /// Wait for the next signal.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> Forwarded {
        tokio::select! {
            _ = self.interrupt.recv() => Forwarded::Interrupt,
            _ = self.terminate.recv() => Forwarded::Terminate,
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> Forwarded {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        Forwarded::Interrupt
    }
}

/// Deliver `signal` to the process `pid`.
#[cfg(unix)]
pub fn forward(pid: u32, signal: Forwarded) -> Result<()> {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).context("Process id out of range")?;
    kill(Pid::from_raw(raw), nix::sys::signal::Signal::from(signal))
        .with_context(|| format!("Failed to send {signal:?} to process {pid}"))
}

#[cfg(not(unix))]
pub fn forward(pid: u32, signal: Forwarded) -> Result<()> {
    anyhow::bail!("Forwarding {signal:?} to process {pid} is not supported on this platform")
}
