//! Transfer multiplexer interface
//!
//! The engine treats the multiplexer as a black box that it drives through
//! socket actions and drains for finished transfers. [`CurlMultiplexer`] is
//! the libcurl-backed implementation.

mod libcurl;

use std::fmt;

use crate::engine::event::ActionTarget;
use crate::engine::notifier::{SocketNotifier, TimerNotifier};
use crate::error::{MultiplexerError, TransferError};
use crate::http::request::Request;
use crate::http::response::Response;

pub use libcurl::CurlMultiplexer;

/// Engine-assigned identity of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferId(u64);

impl TransferId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A transfer the multiplexer reports as done.
#[derive(Debug)]
pub struct Finished {
    pub id: TransferId,
    pub outcome: Result<Response, TransferError>,
}

/// Opaque engine performing the byte-level work of many transfers.
///
/// All calls are made from the engine's local tasks, never concurrently.
/// Dropping the multiplexer releases it together with any transfer it still
/// holds.
pub trait Multiplexer: 'static {
    /// Register the callbacks through which the multiplexer reports socket
    /// interest changes and its next timer deadline.
    fn install_notifiers(
        &mut self,
        sockets: SocketNotifier,
        timer: TimerNotifier,
    ) -> Result<(), MultiplexerError>;

    /// Build a transfer from `request` and start tracking it under `id`.
    ///
    /// On error nothing is retained.
    fn add_transfer(&mut self, id: TransferId, request: &Request) -> Result<(), MultiplexerError>;

    /// Let the multiplexer act on a socket or on its timers. Returns the
    /// number of transfers still running.
    fn socket_action(&mut self, target: ActionTarget) -> Result<usize, MultiplexerError>;

    /// Detach and return every transfer that has finished since the last
    /// call.
    fn drain_finished(&mut self) -> Vec<Finished>;
}
