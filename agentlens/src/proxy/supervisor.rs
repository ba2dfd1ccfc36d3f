//! Owns the child process and drives one session from spawn to exit.
//!
//! Two byte pumps (host stdin to child stdin, child stdout to host stdout)
//! queue a copy of every chunk for the session's recorder task and then
//! forward it unchanged. Queueing never waits, so recording can fail or fall
//! behind without holding up the bytes on the wire. Queueing first keeps a
//! request ahead of any response the child sends to it.

use std::process::ExitStatus;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinError;

use super::lifecycle::{LifecycleEvent, SessionState};
use super::recorder::{self, Observed, Recorder};
use crate::broadcast::{Broadcaster, LiveEvent, SessionEndEvent};
use crate::db::SessionStore;
use crate::error::StoreError;
use crate::models::{generate_session_id, Direction, SessionStatus};
use crate::process::{self, spawn_piped, ProcessOptions, SignalListener};

/// Exit code used when the child never ran or gave no code of its own.
pub const FAILURE_EXIT_CODE: i32 = 1;

const PUMP_BUFFER: usize = 64 * 1024;

/// How long to wait for the child's stdout to drain after it exits.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub session_id: String,
    pub status: SessionStatus,
    /// Child exit code; `None` if it never started or died by signal.
    pub exit_code: Option<i32>,
}

impl SessionOutcome {
    /// Exit code the proxy itself should return.
    pub fn process_exit_code(&self) -> i32 {
        match (self.status, self.exit_code) {
            (SessionStatus::Completed, _) => 0,
            (_, Some(code)) if code != 0 => code,
            _ => FAILURE_EXIT_CODE,
        }
    }
}

pub struct Supervisor {
    store: SessionStore,
    broadcaster: Broadcaster,
}

impl Supervisor {
    pub const fn new(store: SessionStore, broadcaster: Broadcaster) -> Self {
        Self { store, broadcaster }
    }

    /// Run one proxied session between `host_in`/`host_out` and a child
    /// spawned from `options`.
    ///
    /// Child failures end the session with status `error` and still return
    /// `Ok`; only storage failures are returned as errors.
    pub async fn run<R, W>(
        &self,
        options: &ProcessOptions,
        host_in: R,
        host_out: W,
    ) -> Result<SessionOutcome>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let session_id = generate_session_id();
        let command = options.display();
        self.store
            .create_session(&session_id, &command)
            .context("Failed to create session")?;

        let state = SessionState::Created;
        let mut child = match spawn_piped(options) {
            Ok(child) => child,
            Err(err) => {
                tracing::error!(session_id = %session_id, error = %format!("{err:#}"), "child process failed to start");
                let state = state.on(LifecycleEvent::SpawnFailed)?;
                return self.finish(&session_id, state, None);
            }
        };
        let state = state.on(LifecycleEvent::Spawned)?;
        tracing::info!(session_id = %session_id, command = %command, pid = ?child.id(), "session started");

        let child_stdin = child.stdin.take().context("Child stdin was not piped")?;
        let child_stdout = child.stdout.take().context("Child stdout was not piped")?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut recording = tokio::spawn(recorder::run(
            Recorder::new(&session_id, self.store.clone(), self.broadcaster.clone()),
            rx,
        ));
        let inbound = tokio::spawn(pump(
            host_in,
            child_stdin,
            Direction::ClientToServer,
            tx.clone(),
        ));
        let mut outbound = tokio::spawn(pump(
            child_stdout,
            host_out,
            Direction::ServerToClient,
            tx,
        ));

        let mut signals = SignalListener::new()?;
        let mut finished_recorder = None;

        let exit: std::io::Result<ExitStatus> = loop {
            tokio::select! {
                status = child.wait() => break status,
                signal = signals.recv() => {
                    if let Some(pid) = child.id() {
                        tracing::info!(?signal, pid, "forwarding signal to child");
                        if let Err(err) = process::forward(pid, signal) {
                            tracing::warn!(error = %format!("{err:#}"), "could not forward signal");
                        }
                    }
                }
                joined = &mut recording, if finished_recorder.is_none() => {
                    match recorder_result(joined) {
                        Ok(recorder) => finished_recorder = Some(recorder),
                        Err(err) => {
                            tracing::error!(session_id = %session_id, error = %err, "recording failed, stopping child");
                            if let Err(kill_err) = child.kill().await {
                                tracing::warn!(error = %kill_err, "could not stop child");
                            }
                            inbound.abort();
                            outbound.abort();
                            if let Err(end_err) = self.store.end_session(&session_id, SessionStatus::Error) {
                                tracing::warn!(error = %end_err, "could not mark session as errored");
                            }
                            return Err(err.context("Failed to record session"));
                        }
                    }
                }
            }
        };

        let event = match &exit {
            Ok(status) => LifecycleEvent::Exited(status.code()),
            Err(err) => {
                tracing::error!(session_id = %session_id, error = %err, "failed waiting for child");
                LifecycleEvent::ProcessError
            }
        };
        let exit_code = exit.as_ref().ok().and_then(ExitStatus::code);

        if tokio::time::timeout(DRAIN_TIMEOUT, &mut outbound).await.is_err() {
            tracing::warn!("child stdout still open after exit, abandoning it");
            outbound.abort();
        }
        inbound.abort();

        let recorder = match finished_recorder {
            Some(recorder) => recorder,
            None => recorder_result(recording.await).context("Failed to record session")?,
        };

        let (client_tail, server_tail) = recorder.unterminated_bytes();
        if client_tail + server_tail > 0 {
            tracing::debug!(client_tail, server_tail, "discarding unterminated frames");
        }
        if recorder.pending_requests() > 0 {
            tracing::debug!(pending = recorder.pending_requests(), "requests left unanswered");
        }

        let state = state.on(event)?;
        self.finish(&session_id, state, exit_code)
    }

    /// Persist the terminal state and announce it to observers.
    fn finish(
        &self,
        session_id: &str,
        state: SessionState,
        exit_code: Option<i32>,
    ) -> Result<SessionOutcome> {
        debug_assert!(state.is_terminal());
        let status = state.status();

        self.store
            .end_session(session_id, status)
            .context("Failed to end session")?;
        self.broadcaster
            .publish(LiveEvent::SessionEnd(SessionEndEvent {
                session_id: session_id.to_string(),
                code: exit_code,
                status,
            }));

        Ok(SessionOutcome {
            session_id: session_id.to_string(),
            status,
            exit_code,
        })
    }
}

fn recorder_result(joined: Result<Result<Recorder, StoreError>, JoinError>) -> Result<Recorder> {
    Ok(joined.context("Recorder task failed")??)
}

/// Copy `source` to `sink` chunk by chunk, handing a copy of each chunk to
/// the recorder. A sink that stops accepting bytes ends forwarding but not
/// observation; the source is read until EOF.
async fn pump<R, W>(
    mut source: R,
    mut sink: W,
    direction: Direction,
    observed: mpsc::UnboundedSender<Observed>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; PUMP_BUFFER];
    let mut forwarding = true;

    loop {
        let n = match source.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                tracing::debug!(%direction, error = %err, "read failed, closing pump");
                break;
            }
        };
        let _ = observed.send(Observed {
            direction,
            bytes: buf[..n].to_vec(),
            at: Utc::now().timestamp_millis(),
        });

        if forwarding {
            if let Err(err) = write_through(&mut sink, &buf[..n]).await {
                tracing::debug!(%direction, error = %err, "peer stopped reading, forwarding disabled");
                forwarding = false;
            }
        }
    }

    if let Err(err) = sink.shutdown().await {
        tracing::debug!(%direction, error = %err, "closing sink failed");
    }
}

async fn write_through<W: AsyncWrite + Unpin>(sink: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    sink.write_all(bytes).await?;
    sink.flush().await
}
