//! Line-oriented channels to isolated player processes.
//!
//! A [`Transport`] owns one live player process and its three standard
//! streams. Protocol messages travel over stdin/stdout, one JSON object per
//! line; stderr is drained in the background as free-form diagnostics and is
//! never parsed as protocol input.
//!
//! Two implementations satisfy the contract: [`ProcessTransport`] (bare
//! subprocess) and [`SandboxTransport`](crate::sandbox::SandboxTransport)
//! (subprocess inside a resource-capped cgroup). A transport is bound to one
//! match and must never be reused.

use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{debug, instrument, trace, warn};

use crate::error::RefereeError;
use crate::limits::Limits;
use crate::message::Message;
use crate::player::PlayerId;

/// Most diagnostic lines kept per player between drains; excess is dropped.
const DIAGNOSTIC_QUEUE_CAPACITY: usize = 256;

/// Bidirectional line-oriented channel to one isolated player process.
pub trait Transport: Send {
    /// The player this channel belongs to.
    fn player_id(&self) -> &PlayerId;

    /// Spawns the player process with piped stdio and starts the background
    /// diagnostic reader.
    fn start(&mut self, executable: &Path) -> anyhow::Result<()>;

    /// Serializes `message` to one line of text, writes it followed by a
    /// newline and flushes immediately.
    fn send(&mut self, message: &Message) -> Result<(), RefereeError>;

    /// Blocks until one full line is available or `timeout` elapses.
    ///
    /// Idle waiting costs no CPU: the call parks on the reader channel
    /// rather than polling the stream.
    fn receive(&mut self, timeout: Duration) -> Result<Message, RefereeError>;

    /// Returns and clears all currently queued diagnostic lines, in arrival
    /// order. Never blocks.
    fn drain_diagnostics(&mut self) -> Vec<String>;

    /// Closes the player's input to signal shutdown, waits out the grace
    /// period, then forcibly terminates it. Idempotent.
    fn stop(&mut self);
}

/// Streams of a spawned player: the protocol writer plus one background
/// reader per output stream.
pub(crate) struct StreamPump {
    stdin: ChildStdin,
    incoming: Receiver<String>,
    diagnostics: Receiver<String>,
}

impl StreamPump {
    /// Takes the three standard streams of `child` and spawns one reader
    /// thread per output stream. The threads exit on their own once the
    /// streams close.
    pub(crate) fn attach(player: &PlayerId, child: &mut Child) -> anyhow::Result<StreamPump> {
        let stdin = child.stdin.take().context("player stdin was not piped")?;
        let stdout = child.stdout.take().context("player stdout was not piped")?;
        let stderr = child.stderr.take().context("player stderr was not piped")?;

        // reader threads are detached; they exit once their stream closes
        let (line_tx, incoming) = mpsc::channel();
        let _ = thread::Builder::new()
            .name(format!("{player}-stdout"))
            .spawn(move || pump_lines(stdout, line_tx))
            .context("could not spawn stdout reader")?;

        let (diag_tx, diagnostics) = mpsc::sync_channel(DIAGNOSTIC_QUEUE_CAPACITY);
        let _ = thread::Builder::new()
            .name(format!("{player}-stderr"))
            .spawn(move || pump_diagnostics(stderr, diag_tx))
            .context("could not spawn stderr reader")?;

        Ok(StreamPump {
            stdin,
            incoming,
            diagnostics,
        })
    }

    pub(crate) fn send(&mut self, message: &Message) -> Result<(), RefereeError> {
        let mut line = message.to_line();
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .map_err(RefereeError::Send)?;
        self.stdin.flush().map_err(RefereeError::Send)
    }

    pub(crate) fn receive(&mut self, timeout: Duration) -> Result<Message, RefereeError> {
        match self.incoming.recv_timeout(timeout) {
            Ok(line) => Message::from_line(&line),
            Err(RecvTimeoutError::Timeout) => Err(RefereeError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(RefereeError::Disconnected),
        }
    }

    pub(crate) fn drain(&mut self) -> Vec<String> {
        self.diagnostics.try_iter().collect()
    }
}

/// Forwards whole lines from the player's stdout; exits on EOF or error.
fn pump_lines(stdout: impl Read, tx: mpsc::Sender<String>) {
    let reader = BufReader::new(stdout);
    for line in reader.lines() {
        let Ok(line) = line else { break };
        if tx.send(line).is_err() {
            // receiver dropped: the transport was stopped
            break;
        }
    }
}

/// Forwards stderr lines into the bounded diagnostic queue. When the queue
/// is full the line is dropped: diagnostics must never block the exchange.
fn pump_diagnostics(stderr: impl Read, tx: SyncSender<String>) {
    let reader = BufReader::new(stderr);
    for line in reader.lines() {
        let Ok(line) = line else { break };
        match tx.try_send(line) {
            Ok(()) => {}
            Err(TrySendError::Full(line)) => trace!("diagnostic queue full, dropping: {line}"),
            Err(TrySendError::Disconnected(_)) => break,
        }
    }
}

/// Spawns a player executable with all three standard streams piped.
pub(crate) fn spawn_player(executable: &Path) -> anyhow::Result<Child> {
    Command::new(executable)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("could not launch player executable {}", executable.display()))
}

/// Waits up to `grace` for the child to exit on its own, then kills it.
pub(crate) fn shutdown_child(player: &PlayerId, child: &mut Child, grace: Duration) {
    let deadline = Instant::now() + grace;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(%player, %status, "player exited");
                return;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(%player, "could not poll player process: {e}");
                break;
            }
        }
        if Instant::now() >= deadline {
            debug!(%player, "grace period elapsed, killing player");
            break;
        }
        thread::sleep(Duration::from_millis(10).min(grace / 10));
    }
    if let Err(e) = child.kill() {
        debug!(%player, "kill failed (already gone?): {e}");
    }
    let _ = child.wait();
}

/// [`Transport`] over a bare subprocess: piped stdio, no resource isolation.
pub struct ProcessTransport {
    player: PlayerId,
    stop_grace: Duration,
    child: Option<Child>,
    pump: Option<StreamPump>,
}

impl ProcessTransport {
    /// Creates an unstarted transport for `player`.
    pub fn new(player: PlayerId, limits: &Limits) -> Self {
        ProcessTransport {
            player,
            stop_grace: limits.stop_grace,
            child: None,
            pump: None,
        }
    }

    fn pump(&mut self) -> Result<&mut StreamPump, RefereeError> {
        self.pump.as_mut().ok_or(RefereeError::Disconnected)
    }
}

impl Transport for ProcessTransport {
    fn player_id(&self) -> &PlayerId {
        &self.player
    }

    #[instrument(skip_all, fields(player = %self.player))]
    fn start(&mut self, executable: &Path) -> anyhow::Result<()> {
        anyhow::ensure!(self.child.is_none(), "transport already started");
        let mut child = spawn_player(executable)?;
        match StreamPump::attach(&self.player, &mut child) {
            Ok(pump) => {
                self.child = Some(child);
                self.pump = Some(pump);
                Ok(())
            }
            Err(e) => {
                let _ = child.kill();
                Err(e)
            }
        }
    }

    fn send(&mut self, message: &Message) -> Result<(), RefereeError> {
        trace!(player = %self.player, line = %message, "send");
        self.pump()?.send(message)
    }

    fn receive(&mut self, timeout: Duration) -> Result<Message, RefereeError> {
        let message = self.pump()?.receive(timeout)?;
        trace!(player = %self.player, line = %message, "received");
        Ok(message)
    }

    fn drain_diagnostics(&mut self) -> Vec<String> {
        self.pump.as_mut().map(StreamPump::drain).unwrap_or_default()
    }

    fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        // dropping the pump closes stdin: the graceful shutdown signal
        self.pump = None;
        shutdown_child(&self.player, &mut child, self.stop_grace);
    }
}

impl Drop for ProcessTransport {
    fn drop(&mut self) {
        self.stop();
    }
}
