// ── Incremental line framing ──
//
// TCP has no message boundaries: one read can hold half a line, several
// lines, or the tail of one line and the head of the next. The decoder
// keeps the unterminated remainder between reads.

use bytes::BytesMut;

use crate::error::DecodeError;
use crate::record::StatusRecord;

/// Largest unterminated line kept in the carry-over buffer.
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

/// Records decoded from one chunk, in stream order.
#[derive(Debug, Default)]
pub struct DecodedBatch {
    pub records: Vec<StatusRecord>,
    /// Lines rejected as malformed while processing this chunk.
    pub rejected: usize,
}

impl DecodedBatch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.rejected == 0
    }

    /// The last valid record in the batch. Earlier ones are superseded.
    pub fn into_latest(mut self) -> Option<StatusRecord> {
        self.records.pop()
    }
}

/// Splits an arbitrarily chunked byte stream into `\n`-terminated lines
/// and decodes each non-blank line into a [`StatusRecord`].
///
/// A malformed line is logged, counted in [`DecodedBatch::rejected`] and
/// skipped; it never disturbs the bytes carried over for the next line.
#[derive(Debug)]
pub struct FrameDecoder {
    carry: BytesMut,
    /// Prefix of `carry` already known to hold no terminator.
    scanned: usize,
    /// Dropping the rest of an oversized line until the next terminator.
    discarding: bool,
    max_line_bytes: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_max_line_bytes(DEFAULT_MAX_LINE_BYTES)
    }

    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            carry: BytesMut::new(),
            scanned: 0,
            discarding: false,
            max_line_bytes,
        }
    }

    /// Bytes waiting for a terminator.
    pub fn pending(&self) -> usize {
        self.carry.len()
    }

    /// Append `chunk` and decode every line it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> DecodedBatch {
        self.carry.extend_from_slice(chunk);
        let mut batch = DecodedBatch::default();

        while let Some(offset) = self.carry[self.scanned..].iter().position(|&b| b == b'\n') {
            let end = self.scanned + offset;
            self.scanned = 0;

            let frame = self.carry.split_to(end + 1);
            if self.discarding {
                // Tail of a line already reported as too long.
                self.discarding = false;
                continue;
            }
            if end > self.max_line_bytes {
                self.reject_oversized(&mut batch);
                continue;
            }

            match decode_line(&frame[..end]) {
                Ok(Some(record)) => batch.records.push(record),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, line_len = end, "discarding malformed status line");
                    batch.rejected += 1;
                }
            }
        }
        self.scanned = self.carry.len();

        if self.carry.len() > self.max_line_bytes {
            if !self.discarding {
                self.reject_oversized(&mut batch);
                self.discarding = true;
            }
            self.carry.clear();
            self.scanned = 0;
        }

        batch
    }

    /// Same outcome whether the line arrived whole or was cut off mid-stream.
    fn reject_oversized(&self, batch: &mut DecodedBatch) {
        let e = DecodeError::LineTooLong {
            limit: self.max_line_bytes,
        };
        tracing::warn!(error = %e, "discarding oversized status line");
        batch.rejected += 1;
    }
}

/// Decode one line without its terminator. Blank lines yield `None`.
fn decode_line(line: &[u8]) -> Result<Option<StatusRecord>, DecodeError> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return Ok(None);
    }
    let text = std::str::from_utf8(line)?;
    StatusRecord::from_line(text).map(Some)
}

// ── Tests ────────────────────────────────────────────────────────────
