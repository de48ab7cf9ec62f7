//! Append-only NDJSON event logs plus the cycle status document.

pub mod events;
pub mod ndjson;
pub mod status;

pub use events::{CycleStageEventV1, SearchRootEventV1, SelfplayFlushEventV1};
pub use ndjson::{NdjsonError, NdjsonWriter};
pub use status::{deep_merge, read_status, update_status, Phase};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
