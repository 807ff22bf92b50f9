// ── Link session ──
//
// One outbound connection to the monitoring backend. A background task
// reads newline-delimited JSON status lines into a shared slot; commands
// go out on the write half under a lock so concurrent senders never
// interleave bytes.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::LinkError;
use crate::frame::{DEFAULT_MAX_LINE_BYTES, FrameDecoder};
use crate::record::{Mode, StatusRecord};
use crate::slot::{LinkStats, LinkStatsSnapshot, StateSlot};

/// Address the backend listens on by deployment convention.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Port the backend listens on by deployment convention.
pub const DEFAULT_PORT: u16 = 65500;

const DEFAULT_READ_CHUNK_SIZE: usize = 4096;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// How long `close` waits for an in-flight command write to finish.
const WRITER_RELEASE_TIMEOUT: Duration = Duration::from_secs(1);

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// The last open attempt failed. A new `open` may be issued.
    Failed,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

// ── LinkOptions ──────────────────────────────────────────────────────

/// Tunables for a [`LinkSession`].
#[derive(Debug, Clone)]
pub struct LinkOptions {
    /// Upper bound on the TCP connect in [`LinkSession::open`]. Default: 5s.
    pub connect_timeout: Duration,

    /// Size of each read from the transport. Default: 4096.
    pub read_chunk_size: usize,

    /// Longest unterminated line kept before it is dropped. Default: 64 KiB.
    pub max_line_bytes: usize,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

// ── LinkSession ──────────────────────────────────────────────────────

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// State shared between the session handle and its receive loop.
struct Shared {
    slot: StateSlot,
    state: watch::Sender<ConnectionState>,
    writer: tokio::sync::Mutex<Option<BoxedWriter>>,
    stats: LinkStats,
}

struct Control {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

/// Client session to the monitoring backend.
///
/// Share it behind an `Arc` to issue commands from several tasks; reads of
/// [`latest_state`](Self::latest_state) are wait-free and never touch the
/// network. Dropping the session stops its receive loop.
///
/// ```rust,ignore
/// let session = LinkSession::new();
/// session.open(DEFAULT_HOST, DEFAULT_PORT).await?;
/// session.send_command(Mode::Radiation).await?;
///
/// if let Some(status) = session.latest_state() {
///     println!("{}", status.alert_message());
/// }
///
/// session.close().await;
/// ```
pub struct LinkSession {
    options: LinkOptions,
    shared: Arc<Shared>,
    control: Mutex<Control>,
}

impl Default for LinkSession {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkSession {
    pub fn new() -> Self {
        Self::with_options(LinkOptions::default())
    }

    pub fn with_options(options: LinkOptions) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            options,
            shared: Arc::new(Shared {
                slot: StateSlot::new(),
                state,
                writer: tokio::sync::Mutex::new(None),
                stats: LinkStats::default(),
            }),
            control: Mutex::new(Control {
                cancel: CancellationToken::new(),
                task: None,
            }),
        }
    }

    pub fn options(&self) -> &LinkOptions {
        &self.options
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Connect to the backend and start the receive loop.
    ///
    /// Returns once the TCP connection is up (or has failed); the loop runs
    /// on its own task. On failure the state becomes
    /// [`Failed`](ConnectionState::Failed) and no loop is started.
    pub async fn open(&self, host: &str, port: u16) -> Result<(), LinkError> {
        let attempt = self.begin_attempt()?;
        let addr = format!("{host}:{port}");
        info!(%addr, "connecting to backend");

        let stream =
            match tokio::time::timeout(self.options.connect_timeout, TcpStream::connect((host, port)))
                .await
            {
                Ok(Ok(stream)) => stream,
                Ok(Err(source)) => {
                    warn!(%addr, error = %source, "connection to backend failed");
                    return Err(LinkError::Connect { addr, source });
                }
                Err(_) => {
                    let timeout_secs = self.options.connect_timeout.as_secs();
                    warn!(%addr, timeout_secs, "connection to backend timed out");
                    return Err(LinkError::ConnectTimeout { addr, timeout_secs });
                }
            };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "could not disable Nagle on backend socket");
        }

        let (reader, writer) = stream.into_split();
        let started = self.start(reader, writer).await;
        attempt.settle();
        started?;
        info!(%addr, "connected to backend");
        Ok(())
    }

    /// Adopt an already-established bidirectional transport.
    pub async fn attach<S>(&self, stream: S) -> Result<(), LinkError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        self.attach_split(reader, writer).await
    }

    /// Adopt separate read and write halves of a transport.
    pub async fn attach_split<R, W>(&self, reader: R, writer: W) -> Result<(), LinkError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let attempt = self.begin_attempt()?;
        let started = self.start(reader, writer).await;
        attempt.settle();
        started?;
        debug!("attached transport");
        Ok(())
    }

    /// Stop the receive loop, release the transport and move to
    /// [`Disconnected`](ConnectionState::Disconnected).
    ///
    /// Idempotent. The last decoded snapshot stays readable afterwards.
    /// An `open` still in flight on another task fails with
    /// [`LinkError::Closed`] instead of going live.
    pub async fn close(&self) {
        let task = {
            let mut control = self.control();
            control.cancel.cancel();
            control.task.take()
        };

        match tokio::time::timeout(WRITER_RELEASE_TIMEOUT, self.shared.writer.lock()).await {
            Ok(mut guard) => {
                if let Some(mut writer) = guard.take() {
                    if let Err(e) = writer.shutdown().await {
                        debug!(error = %e, "transport shutdown failed (non-fatal)");
                    }
                }
            }
            Err(_) => warn!("command write still pending, leaving transport to be dropped"),
        }

        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "receive loop task ended abnormally");
            }
        }

        let changed = self
            .shared
            .state
            .send_if_modified(|state| replace(state, ConnectionState::Disconnected));
        if changed {
            info!("link session closed");
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Send a mode command as one `<code>\n` write.
    ///
    /// Not connected: nothing is written, a warning is logged and
    /// [`LinkError::NotConnected`] returned. A failed write is logged and
    /// dropped; the session stays open.
    pub async fn send_command(&self, mode: Mode) -> Result<(), LinkError> {
        if !self.state().is_connected() {
            warn!(%mode, "not connected to backend, dropping command");
            return Err(LinkError::NotConnected);
        }

        let mut guard = self.shared.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            warn!(%mode, "transport already released, dropping command");
            return Err(LinkError::NotConnected);
        };

        let line = mode.wire_line();
        let written = async {
            writer.write_all(&line).await?;
            writer.flush().await
        }
        .await;

        match written {
            Ok(()) => {
                LinkStats::add(&self.shared.stats.commands_sent, 1);
                debug!(%mode, label = mode.label(), "sent command to backend");
                Ok(())
            }
            Err(e) => {
                warn!(%mode, error = %e, "failed to send command");
                Err(LinkError::Write(e))
            }
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// Most recent decoded status, or `None` if nothing has arrived since
    /// the connection was opened. Never blocks.
    pub fn latest_state(&self) -> Option<Arc<StatusRecord>> {
        self.shared.slot.load()
    }

    /// Changes whenever the latest-state slot is replaced or cleared.
    pub fn state_generation(&self) -> u64 {
        self.shared.slot.generation()
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Subscribe to connection state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn stats(&self) -> LinkStatsSnapshot {
        self.shared.stats.snapshot()
    }

    // ── Internals ────────────────────────────────────────────────────

    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move Disconnected/Failed → Connecting, or refuse if already open.
    ///
    /// Each attempt gets its own cancellation token, installed under the
    /// control lock so a concurrent `close` always cancels this attempt.
    fn begin_attempt(&self) -> Result<ConnectAttempt<'_>, LinkError> {
        let mut control = self.control();
        let accepted = self.shared.state.send_if_modified(|state| match state {
            ConnectionState::Disconnected | ConnectionState::Failed => {
                *state = ConnectionState::Connecting;
                true
            }
            ConnectionState::Connecting | ConnectionState::Connected => false,
        });

        if accepted {
            control.cancel = CancellationToken::new();
            Ok(ConnectAttempt {
                state: &self.shared.state,
                settled: false,
            })
        } else {
            Err(LinkError::AlreadyOpen)
        }
    }

    async fn start<R, W>(&self, reader: R, writer: W) -> Result<(), LinkError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let mut writer_slot = self.shared.writer.lock().await;
        let mut control = self.control();

        if control.cancel.is_cancelled() {
            self.shared.state.send_if_modified(|state| {
                *state == ConnectionState::Connecting
                    && replace(state, ConnectionState::Disconnected)
            });
            debug!("session closed while connecting, dropping transport");
            return Err(LinkError::Closed);
        }

        self.shared.slot.clear();
        *writer_slot = Some(Box::new(writer));

        // Connected before the loop exists, so an immediate EOF can only
        // ever move the state forward to Disconnected.
        self.shared.state.send_replace(ConnectionState::Connected);

        control.task = Some(tokio::spawn(receive_loop(
            reader,
            Arc::clone(&self.shared),
            control.cancel.clone(),
            self.options.read_chunk_size.max(1),
            self.options.max_line_bytes,
        )));
        Ok(())
    }
}

impl Drop for LinkSession {
    fn drop(&mut self) {
        self.control
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel
            .cancel();
    }
}

impl fmt::Debug for LinkSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkSession")
            .field("state", &self.state())
            .field("options", &self.options)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Marks the state Failed if an open attempt ends without settling,
/// including when the `open` future is dropped mid-connect.
struct ConnectAttempt<'a> {
    state: &'a watch::Sender<ConnectionState>,
    settled: bool,
}

impl ConnectAttempt<'_> {
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for ConnectAttempt<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.state.send_replace(ConnectionState::Failed);
        }
    }
}

fn replace(state: &mut ConnectionState, next: ConnectionState) -> bool {
    if *state == next {
        false
    } else {
        *state = next;
        true
    }
}

// ── Receive loop ─────────────────────────────────────────────────────

/// Read → frame → decode → publish, until cancelled, EOF or read error.
async fn receive_loop<R>(
    mut reader: R,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    chunk_size: usize,
    max_line_bytes: usize,
) where
    R: AsyncRead + Unpin,
{
    let mut decoder = FrameDecoder::with_max_line_bytes(max_line_bytes);
    let mut buf = vec![0u8; chunk_size];

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("receive loop cancelled");
                return;
            }
            read = reader.read(&mut buf) => {
                match read {
                    Ok(0) => {
                        info!("backend closed the connection");
                        break;
                    }
                    Ok(n) => shared.ingest(&mut decoder, &buf[..n]),
                    Err(e) => {
                        warn!(error = %e, "backend read failed");
                        break;
                    }
                }
            }
        }
    }

    if decoder.pending() > 0 {
        debug!(bytes = decoder.pending(), "dropping unterminated trailing line");
    }

    // Release the writer before announcing Disconnected so a fresh `open`
    // never has its transport taken by this exiting loop.
    shared.writer.lock().await.take();
    shared.state.send_if_modified(|state| {
        *state == ConnectionState::Connected && replace(state, ConnectionState::Disconnected)
    });
}

impl Shared {
    fn ingest(&self, decoder: &mut FrameDecoder, chunk: &[u8]) {
        let batch = decoder.feed(chunk);
        let decoded = batch.records.len();
        let rejected = batch.rejected;

        if let Some(record) = batch.into_latest() {
            trace!(decoded, "publishing latest status");
            self.slot.store(record);
        }

        // Counters trail the slot store: a reader that sees a count also
        // sees the record it counts.
        LinkStats::add(&self.stats.decode_errors, rejected);
        LinkStats::add(&self.stats.frames_decoded, decoded);
        LinkStats::add(&self.stats.bytes_received, chunk.len());
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = LinkOptions::default();
        assert_eq!(options.connect_timeout, Duration::from_secs(5));
        assert_eq!(options.read_chunk_size, 4096);
        assert_eq!(options.max_line_bytes, 64 * 1024);
    }

    #[test]
    fn new_session_is_disconnected_and_empty() {
        let session = LinkSession::new();
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(session.latest_state().is_none());
        assert_eq!(session.stats(), LinkStatsSnapshot::default());
    }

    #[tokio::test]
    async fn send_before_open_is_a_noop() {
        let session = LinkSession::new();
        let result = session.send_command(Mode::Gas).await;
        assert!(matches!(result, Err(LinkError::NotConnected)), "got: {result:?}");
        assert_eq!(session.stats().commands_sent, 0);
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn close_without_open_is_harmless() {
        let session = LinkSession::new();
        session.close().await;
        session.close().await;
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn second_attach_is_rejected_while_connected() {
        let session = LinkSession::new();
        let (client, _server) = tokio::io::duplex(64);
        session.attach(client).await.unwrap();

        let (other, _other_server) = tokio::io::duplex(64);
        let result = session.attach(other).await;
        assert!(matches!(result, Err(LinkError::AlreadyOpen)), "got: {result:?}");
        assert_eq!(session.state(), ConnectionState::Connected);

        session.close().await;
    }

    #[tokio::test]
    async fn close_during_open_keeps_session_down() {
        let session = LinkSession::new();
        let attempt = session.begin_attempt().unwrap();
        session.close().await;
        assert_eq!(session.state(), ConnectionState::Disconnected);

        let (client, _server) = tokio::io::duplex(64);
        let (reader, writer) = tokio::io::split(client);
        let started = session.start(reader, writer).await;
        attempt.settle();

        assert!(matches!(started, Err(LinkError::Closed)), "got: {started:?}");
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(session.control().task.is_none());
        assert!(session.shared.writer.lock().await.is_none());

        // The next open gets a fresh token and goes live.
        let (client, _server) = tokio::io::duplex(64);
        session.attach(client).await.unwrap();
        assert_eq!(session.state(), ConnectionState::Connected);
        session.close().await;
    }

    #[test]
    fn dropped_attempt_marks_failed() {
        let session = LinkSession::new();
        {
            let _attempt = session.begin_attempt().unwrap();
            assert_eq!(session.state(), ConnectionState::Connecting);
        }
        assert_eq!(session.state(), ConnectionState::Failed);
    }
}
