//! I/O task
//!
//! Turns queued readiness events into bounded readiness waits followed by
//! socket actions. Sockets stay in a watch table until the multiplexer
//! removes them, because the multiplexer only reports interest changes: a
//! socket it keeps reading from produces no new event.
//!
//! Readiness is registered on a duplicate of the multiplexer's descriptor.
//! The multiplexer may close its socket from the timeout task while a wait is
//! pending here, and the number can then be handed to another resource on the
//! runtime. Deregistering the duplicate never touches that resource.

use std::collections::HashMap;
use std::io;
use std::os::fd::{BorrowedFd, OwnedFd};
use std::rc::Rc;
use std::task::Poll;
use std::time::Duration;

use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tracing::debug;

use crate::engine::event::{ActionTarget, Socket, WaitKind};
use crate::engine::Shared;
use crate::multi::Multiplexer;

/// Register a private duplicate of `socket` for `interest`.
///
/// Fails when the multiplexer has already closed the socket.
fn register(socket: Socket, interest: Interest) -> io::Result<AsyncFd<OwnedFd>> {
    if socket < 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "invalid socket"));
    }
    // SAFETY: the descriptor is only used to duplicate it; a number closed in
    // the meantime makes the duplication fail with EBADF.
    let borrowed = unsafe { BorrowedFd::borrow_raw(socket) };
    let owned = borrowed.try_clone_to_owned()?;
    AsyncFd::with_interest(owned, interest)
}

pub(crate) async fn run<M: Multiplexer>(shared: Rc<Shared<M>>) {
    let mut watched: HashMap<Socket, WaitKind> = HashMap::new();

    while shared.is_live() {
        while let Some(event) = shared.pop_event() {
            debug!(socket = event.socket, kind = ?event.kind, "Readiness event");

            if event.kind == WaitKind::Removed {
                watched.remove(&event.socket);
                continue;
            }
            watched.insert(event.socket, event.kind);

            if let Err(e) = wait_ready(event.socket, event.kind, shared.io_wait).await {
                // the multiplexer's own state decides what the action does
                debug!(socket = event.socket, error = %e, "Cannot wait on socket");
                watched.remove(&event.socket);
            }

            shared.socket_action(ActionTarget::Socket {
                socket: event.socket,
                kind: event.kind,
            });

            if !shared.is_live() {
                return;
            }
        }

        if watched.is_empty() {
            shared.io_wake.notified().await;
            continue;
        }

        let sweep = tokio::select! {
            _ = shared.io_wake.notified() => None,
            sweep = wait_any(&watched, shared.io_wait) => Some(sweep),
        };

        let Some(sweep) = sweep else {
            continue;
        };
        for socket in sweep.stale {
            watched.remove(&socket);
        }
        for (socket, kind) in sweep.ready {
            shared.socket_action(ActionTarget::Socket { socket, kind });
        }
    }
}

/// Wait until `socket` is ready for `kind`, giving up after `bound`.
///
/// A timeout is not an error: the caller acts on the socket either way.
async fn wait_ready(socket: Socket, kind: WaitKind, bound: Duration) -> io::Result<()> {
    let Some(interest) = kind.interest() else {
        return Ok(());
    };

    let fd = register(socket, interest)?;
    match tokio::time::timeout(bound, fd.ready(interest)).await {
        Ok(guard) => guard.map(|_| ()),
        Err(_) => Ok(()),
    }
}

#[derive(Debug, Default)]
struct Sweep {
    ready: Vec<(Socket, WaitKind)>,
    /// Sockets that could not be registered for readiness (already closed)
    stale: Vec<Socket>,
}

/// Wait until at least one watched socket is ready, for at most `bound`.
async fn wait_any(watched: &HashMap<Socket, WaitKind>, bound: Duration) -> Sweep {
    let mut sweep = Sweep::default();
    let mut fds = Vec::with_capacity(watched.len());

    for (&socket, &kind) in watched {
        let Some(interest) = kind.interest() else {
            continue;
        };
        match register(socket, interest) {
            Ok(fd) => fds.push((socket, kind, fd)),
            Err(e) => {
                debug!(socket, error = %e, "Dropping stale socket");
                sweep.stale.push(socket);
            }
        }
    }

    if fds.is_empty() {
        return sweep;
    }

    let any_ready = std::future::poll_fn(|cx| {
        let ready: Vec<(Socket, WaitKind)> = fds
            .iter()
            .filter(|(_, kind, fd)| poll_socket(fd, *kind, cx))
            .map(|(socket, kind, _)| (*socket, *kind))
            .collect();

        if ready.is_empty() {
            Poll::Pending
        } else {
            Poll::Ready(ready)
        }
    });

    if let Ok(ready) = tokio::time::timeout(bound, any_ready).await {
        sweep.ready = ready;
    }
    sweep
}

/// Poll `fd` for the readiness `kind` asks for. Errors count as ready so the
/// multiplexer gets to see them.
fn poll_socket(fd: &AsyncFd<OwnedFd>, kind: WaitKind, cx: &mut std::task::Context<'_>) -> bool {
    let readable = kind.wants_read() && fd.poll_read_ready(cx).is_ready();
    let writable = kind.wants_write() && fd.poll_write_ready(cx).is_ready();
    readable || writable
}
