//! The inference server: `POST /get-move` plus health and Swap2 helpers,
//! served over a small blocking HTTP/1.1 listener.

pub mod book;
pub mod http;
pub mod server;
pub mod think;

pub use book::OpeningBook;
pub use server::{Server, ServerError};
pub use think::{compute_think_time, ThinkRequest};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
