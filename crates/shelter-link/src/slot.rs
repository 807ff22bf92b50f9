// ── Latest-state slot ──
//
// Single writer (the receive loop), any number of readers (display
// frames). Readers get an `Arc` snapshot; a swap never exposes a
// half-written record.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;

use crate::record::StatusRecord;

/// Holds at most one [`StatusRecord`]; each store replaces the previous one.
#[derive(Debug, Default)]
pub struct StateSlot {
    current: ArcSwapOption<StatusRecord>,
    /// Bumped on every store so pollers can cheaply detect change.
    generation: AtomicU64,
}

impl StateSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot. Wait-free.
    pub fn load(&self) -> Option<Arc<StatusRecord>> {
        self.current.load_full()
    }

    pub fn store(&self, record: StatusRecord) {
        self.current.store(Some(Arc::new(record)));
        self.generation.fetch_add(1, Ordering::Release);
    }

    pub fn clear(&self) {
        self.current.store(None);
        self.generation.fetch_add(1, Ordering::Release);
    }

    /// Number of stores and clears so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

// ── Link statistics ──────────────────────────────────────────────────

/// Running counters for one session, shared with its receive loop.
#[derive(Debug, Default)]
pub(crate) struct LinkStats {
    pub(crate) frames_decoded: AtomicU64,
    pub(crate) decode_errors: AtomicU64,
    pub(crate) commands_sent: AtomicU64,
    pub(crate) bytes_received: AtomicU64,
}

/// Point-in-time copy of the session counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStatsSnapshot {
    pub frames_decoded: u64,
    pub decode_errors: u64,
    pub commands_sent: u64,
    pub bytes_received: u64,
}

impl LinkStats {
    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(u64::try_from(n).unwrap_or(u64::MAX), Ordering::Release);
    }

    pub(crate) fn snapshot(&self) -> LinkStatsSnapshot {
        LinkStatsSnapshot {
            frames_decoded: self.frames_decoded.load(Ordering::Acquire),
            decode_errors: self.decode_errors.load(Ordering::Acquire),
            commands_sent: self.commands_sent.load(Ordering::Acquire),
            bytes_received: self.bytes_received.load(Ordering::Acquire),
        }
    }
}
