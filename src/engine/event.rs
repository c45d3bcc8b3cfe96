use std::os::fd::RawFd;

use tokio::io::Interest;

/// OS socket descriptor as handed out by the multiplexer.
pub type Socket = RawFd;

/// What the multiplexer wants to wait for on a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitKind {
    /// Wait until the socket is readable
    Read,
    /// Wait until the socket is writable
    Write,
    /// Wait until the socket is readable or writable
    ReadWrite,
    /// Stop watching the socket
    Removed,
}

impl WaitKind {
    pub fn wants_read(self) -> bool {
        matches!(self, WaitKind::Read | WaitKind::ReadWrite)
    }

    pub fn wants_write(self) -> bool {
        matches!(self, WaitKind::Write | WaitKind::ReadWrite)
    }

    /// OS-level readiness interest for this wait, `None` for [`WaitKind::Removed`].
    pub fn interest(self) -> Option<Interest> {
        match self {
            WaitKind::Read => Some(Interest::READABLE),
            WaitKind::Write => Some(Interest::WRITABLE),
            WaitKind::ReadWrite => Some(Interest::READABLE | Interest::WRITABLE),
            WaitKind::Removed => None,
        }
    }
}

/// A socket's changed wait interest, as reported by the multiplexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessEvent {
    pub socket: Socket,
    pub kind: WaitKind,
}

impl ReadinessEvent {
    pub fn new(socket: Socket, kind: WaitKind) -> Self {
        Self { socket, kind }
    }
}

/// Target of a multiplexer socket action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionTarget {
    /// Act on a socket that is (probably) ready for `kind`.
    Socket { socket: Socket, kind: WaitKind },
    /// Run the multiplexer's timer path.
    Timeout,
}
