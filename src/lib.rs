//! asyncurl - asynchronous HTTP request engine
//!
//! Drives many concurrent HTTP transfers from a single cooperative thread by
//! pumping a libcurl multi handle's socket readiness events through two
//! long-lived local tasks.

pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod multi;

pub use engine::{Completion, Engine, EngineStats, PendingTransfer};
pub use error::{EngineError, MultiplexerError, TransferError};

/// Crate version together with the libcurl version it is linked against.
pub fn version() -> String {
    format!(
        "asyncurl {} (libcurl {})",
        env!("CARGO_PKG_VERSION"),
        curl::Version::get().version()
    )
}
