use thiserror::Error;

/// Errors surfaced by [`LinkSession`](crate::LinkSession) operations.
///
/// Only `open`/`attach` and `send_command` return these. Failures inside
/// the background receive loop never cross the session boundary; they show
/// up as a [`ConnectionState`](crate::ConnectionState) transition instead.
#[derive(Debug, Error)]
pub enum LinkError {
    // ── Connection ──────────────────────────────────────────────────
    /// TCP connect to the backend failed (refused, unreachable, etc.)
    #[error("Cannot connect to backend at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The connect attempt did not complete in time.
    #[error("Connecting to backend at {addr} timed out after {timeout_secs}s")]
    ConnectTimeout { addr: String, timeout_secs: u64 },

    /// `open` was called while a connection is already up or in progress.
    #[error("Session already has an open connection")]
    AlreadyOpen,

    /// `close` ran while this `open` was still connecting.
    #[error("Session was closed while connecting")]
    Closed,

    // ── Commands ────────────────────────────────────────────────────
    /// A command was issued while the session is not connected.
    #[error("Session is not connected -- command dropped")]
    NotConnected,

    /// Writing a command to the transport failed. The session stays open.
    #[error("Failed to write command: {0}")]
    Write(#[source] std::io::Error),
}

impl LinkError {
    /// Returns `true` if re-invoking `open` might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::ConnectTimeout { .. })
    }
}

/// Reasons a single inbound line was rejected by the
/// [`FrameDecoder`](crate::FrameDecoder).
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("line is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("malformed status record: {0}")]
    Json(#[from] serde_json::Error),

    /// Carry-over grew past the configured limit without a line terminator.
    #[error("line exceeds {limit} bytes without a terminator")]
    LineTooLong { limit: usize },
}
