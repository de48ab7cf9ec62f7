//! Feature encoding: boards to network input tensors.

pub mod encode;
pub mod schema;

pub use encode::encode_board_v1;
pub use schema::{feature_len, Features, FEATURE_SCHEMA_ID, PLANES};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
