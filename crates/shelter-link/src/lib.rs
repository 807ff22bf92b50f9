// shelter-link: Client session for the shelter monitoring backend.
//
// Newline-delimited JSON status lines in, single-character mode commands
// out, over one long-lived TCP connection.

pub mod error;
pub mod frame;
pub mod record;
pub mod session;
pub mod slot;

// ── Primary re-exports ──────────────────────────────────────────────
pub use error::{DecodeError, LinkError};
pub use frame::{DecodedBatch, FrameDecoder};
pub use record::{Mode, ModeCode, SensorReadings, StatusRecord};
pub use session::{ConnectionState, DEFAULT_HOST, DEFAULT_PORT, LinkOptions, LinkSession};
pub use slot::{LinkStatsSnapshot, StateSlot};
