//! Scripted multiplexer for engine tests
//!
//! The transfer's host picks its behaviour:
//!
//! - `sock.test` (and any unknown host): completes once its socket turns
//!   readable, which it does right away
//! - `timer.test`: completes after three timer actions
//! - `close.test`: never readable; the third timer action closes its socket
//!   and completes it
//! - `fail.test`: fails on the first timer action
//! - `never.test`: never completes
//! - `reject.test`: refused at registration
//!
//! Like libcurl, every action re-announces the next timer deadline.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::HashMap;
use std::future::Future;
use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::rc::Rc;
use std::time::Duration;

use asyncurl::engine::event::{ActionTarget, Socket, WaitKind};
use asyncurl::engine::notifier::{SocketNotifier, TimerNotifier};
use asyncurl::http::request::{Request, RequestBuilder};
use asyncurl::http::response::ResponseCollector;
use asyncurl::multi::{Finished, Multiplexer, TransferId};
use asyncurl::{MultiplexerError, TransferError};

pub const TIMER_TICKS: u32 = 3;

#[derive(Debug, Default)]
pub struct Tally {
    pub released: Cell<u32>,
    pub registered: Cell<u32>,
    pub socket_actions: Cell<u32>,
    pub timeout_actions: Cell<u32>,
}

enum Plan {
    Socket { local: UnixStream, _peer: UnixStream },
    Closing { local: UnixStream, _peer: UnixStream, left: u32 },
    Ticks(u32),
    Fail,
    Never,
}

enum Step {
    Complete(&'static [u8]),
    Fail,
}

pub struct ScriptedMultiplexer {
    tally: Rc<Tally>,
    notifiers: Option<(SocketNotifier, TimerNotifier)>,
    transfers: HashMap<TransferId, Plan>,
    finished: Vec<Finished>,
    fail_install: bool,
}

impl ScriptedMultiplexer {
    pub fn new() -> (Self, Rc<Tally>) {
        let tally = Rc::new(Tally::default());
        let multiplexer = Self {
            tally: tally.clone(),
            notifiers: None,
            transfers: HashMap::new(),
            finished: Vec::new(),
            fail_install: false,
        };
        (multiplexer, tally)
    }

    pub fn failing_install(mut self) -> Self {
        self.fail_install = true;
        self
    }

    fn sockets(&self) -> &SocketNotifier {
        &self.notifiers.as_ref().expect("notifiers installed").0
    }

    fn owner_of(&self, socket: Socket) -> Option<TransferId> {
        self.transfers.iter().find_map(|(id, plan)| match plan {
            Plan::Socket { local, .. } if local.as_raw_fd() == socket => Some(*id),
            _ => None,
        })
    }

    fn complete(&mut self, id: TransferId, body: &[u8]) {
        if let Some(Plan::Socket { local, .. } | Plan::Closing { local, .. }) =
            self.transfers.get(&id)
        {
            self.sockets().notify(local.as_raw_fd(), WaitKind::Removed);
        }
        // closes the socket pair
        self.transfers.remove(&id);

        let mut collector = ResponseCollector::new(1024);
        collector.header_line(b"HTTP/1.1 200 OK\r\n");
        collector.header_line(b"Content-Type: text/plain\r\n");
        collector.write_body(body);
        self.finished.push(Finished {
            id,
            outcome: Ok(collector.finish(None)),
        });
    }

    /// Next timer deadline, as libcurl reports it from inside its actions.
    fn announce_timer(&self) {
        if let Some((_, timer)) = &self.notifiers {
            let next = (!self.transfers.is_empty()).then_some(Duration::from_millis(500));
            timer.notify(next);
        }
    }

    fn fail(&mut self, id: TransferId) {
        self.transfers.remove(&id);
        self.finished.push(Finished {
            id,
            outcome: Err(TransferError::Curl {
                code: 7,
                message: "Couldn't connect to server".to_string(),
            }),
        });
    }
}

impl Drop for ScriptedMultiplexer {
    fn drop(&mut self) {
        self.tally.released.set(self.tally.released.get() + 1);
    }
}

impl Multiplexer for ScriptedMultiplexer {
    fn install_notifiers(
        &mut self,
        sockets: SocketNotifier,
        timer: TimerNotifier,
    ) -> Result<(), MultiplexerError> {
        if self.fail_install {
            return Err(MultiplexerError::Other("scripted install failure".to_string()));
        }
        self.notifiers = Some((sockets, timer));
        Ok(())
    }

    fn add_transfer(&mut self, id: TransferId, request: &Request) -> Result<(), MultiplexerError> {
        let plan = match request.url.host_str() {
            Some("reject.test") => {
                return Err(MultiplexerError::Other("scripted rejection".to_string()));
            }
            Some("timer.test") => Plan::Ticks(TIMER_TICKS),
            Some("fail.test") => Plan::Fail,
            Some("never.test") => Plan::Never,
            Some("close.test") => {
                let (local, peer) = UnixStream::pair()
                    .map_err(|e| MultiplexerError::Other(e.to_string()))?;
                local
                    .set_nonblocking(true)
                    .map_err(|e| MultiplexerError::Other(e.to_string()))?;
                self.sockets().notify(local.as_raw_fd(), WaitKind::Read);
                Plan::Closing {
                    local,
                    _peer: peer,
                    left: TIMER_TICKS,
                }
            }
            _ => {
                let (local, mut peer) = UnixStream::pair()
                    .map_err(|e| MultiplexerError::Other(e.to_string()))?;
                local
                    .set_nonblocking(true)
                    .map_err(|e| MultiplexerError::Other(e.to_string()))?;
                peer.write_all(request.url.path().as_bytes())
                    .map_err(|e| MultiplexerError::Other(e.to_string()))?;
                self.sockets().notify(local.as_raw_fd(), WaitKind::Read);
                Plan::Socket { local, _peer: peer }
            }
        };

        self.transfers.insert(id, plan);
        self.tally.registered.set(self.tally.registered.get() + 1);
        if let Some((_, timer)) = &self.notifiers {
            timer.notify(Some(Duration::ZERO));
        }
        Ok(())
    }

    fn socket_action(&mut self, target: ActionTarget) -> Result<usize, MultiplexerError> {
        match target {
            ActionTarget::Socket { socket, .. } => {
                self.tally.socket_actions.set(self.tally.socket_actions.get() + 1);

                if let Some(id) = self.owner_of(socket) {
                    let mut buf = [0u8; 256];
                    let read = match self.transfers.get(&id) {
                        Some(Plan::Socket { local, .. }) => (&*local).read(&mut buf),
                        _ => Ok(0),
                    };
                    if let Ok(n) = read {
                        if n > 0 {
                            self.complete(id, &buf[..n]);
                        }
                    }
                }
            }
            ActionTarget::Timeout => {
                self.tally.timeout_actions.set(self.tally.timeout_actions.get() + 1);

                let ids: Vec<TransferId> = self.transfers.keys().copied().collect();
                for id in ids {
                    let step = match self.transfers.get_mut(&id) {
                        Some(Plan::Ticks(left)) => {
                            *left -= 1;
                            (*left == 0).then_some(Step::Complete(b"tick"))
                        }
                        Some(Plan::Closing { left, .. }) => {
                            *left -= 1;
                            (*left == 0).then_some(Step::Complete(b"closed"))
                        }
                        Some(Plan::Fail) => Some(Step::Fail),
                        _ => None,
                    };
                    match step {
                        Some(Step::Complete(body)) => self.complete(id, body),
                        Some(Step::Fail) => self.fail(id),
                        None => {}
                    }
                }
            }
        }
        self.announce_timer();
        Ok(self.transfers.len())
    }

    fn drain_finished(&mut self) -> Vec<Finished> {
        std::mem::take(&mut self.finished)
    }
}

pub fn request(url: &str) -> Request {
    RequestBuilder::new().url(url).build().expect("valid request")
}

/// Await `fut`, failing the test if it takes longer than five seconds.
pub async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("timed out")
}
