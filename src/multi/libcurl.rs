//! libcurl multi-interface multiplexer
//!
//! Each transfer is an `Easy2` handle whose handler collects the response.
//! libcurl reports socket interest through its socket callback and its next
//! timeout through its timer callback; both are routed to the engine's
//! notifiers.

use std::collections::HashMap;

use curl::easy::{Easy2, Handler, List, WriteError};
use curl::multi::{Easy2Handle, Events, Multi, SocketEvents};
use tracing::{trace, warn};

use crate::config::TransferDefaults;
use crate::engine::event::{ActionTarget, WaitKind};
use crate::engine::notifier::{SocketNotifier, TimerNotifier};
use crate::error::{MultiplexerError, TransferError};
use crate::http::request::{Method, Request};
use crate::http::response::{Response, ResponseCollector};
use crate::multi::{Finished, Multiplexer, TransferId};

/// Handler for one transfer: body sink, header sink and progress callback.
struct Collector {
    id: TransferId,
    response: ResponseCollector,
}

impl Handler for Collector {
    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        trace!(id = %self.id, bytes = data.len(), "Body chunk");
        Ok(self.response.write_body(data))
    }

    fn header(&mut self, data: &[u8]) -> bool {
        self.response.header_line(data);
        true
    }

    fn progress(&mut self, dltotal: f64, dlnow: f64, _ultotal: f64, _ulnow: f64) -> bool {
        trace!(id = %self.id, dlnow, dltotal, "Progress");
        true
    }
}

/// [`Multiplexer`] backed by a libcurl multi handle.
pub struct CurlMultiplexer {
    // handles detach before the multi handle is cleaned up
    handles: HashMap<TransferId, Easy2Handle<Collector>>,
    multi: Multi,
    max_body_bytes: usize,
}

impl CurlMultiplexer {
    pub fn new(defaults: &TransferDefaults) -> Self {
        Self {
            handles: HashMap::new(),
            multi: Multi::new(),
            max_body_bytes: defaults.max_body_bytes,
        }
    }

    fn build_easy(&self, id: TransferId, request: &Request) -> Result<Easy2<Collector>, curl::Error> {
        let mut easy = Easy2::new(Collector {
            id,
            response: ResponseCollector::new(self.max_body_bytes),
        });

        easy.url(request.url.as_str())?;
        match request.method {
            Method::GET => easy.get(true)?,
            Method::HEAD => easy.nobody(true)?,
            Method::POST => easy.post(true)?,
            other => easy.custom_request(other.as_str())?,
        }
        if !request.body.is_empty() {
            easy.post_fields_copy(&request.body)?;
        }

        let mut headers = List::new();
        for (key, value) in &request.headers {
            headers.append(&format!("{}: {}", key, value))?;
        }
        easy.http_headers(headers)?;

        if let Some(agent) = &request.user_agent {
            easy.useragent(agent)?;
        }
        if let Some(hosts) = &request.no_proxy {
            easy.noproxy(hosts)?;
        }

        easy.low_speed_limit(request.limits.low_speed_limit)?;
        easy.low_speed_time(request.limits.low_speed_time)?;
        easy.connect_timeout(request.limits.connect_timeout)?;
        easy.verbose(request.verbose)?;
        easy.progress(true)?;

        Ok(easy)
    }

    fn finish(
        &self,
        id: TransferId,
        handle: Easy2Handle<Collector>,
        result: Result<(), curl::Error>,
    ) -> Finished {
        let outcome = match self.multi.remove2(handle) {
            Ok(mut easy) => {
                // the handler's parsed status line covers a failed lookup
                let status = easy.response_code().ok().and_then(|c| u16::try_from(c).ok());
                let response: Response = easy.get_mut().response.finish(status);
                result.map(|()| response).map_err(TransferError::from)
            }
            Err(e) => Err(TransferError::Detach(e.to_string())),
        };
        Finished { id, outcome }
    }
}

/// Message token for `id`; ids that do not fit a `usize` are refused.
fn token_for(id: TransferId) -> Result<usize, MultiplexerError> {
    usize::try_from(id.as_u64())
        .map_err(|_| MultiplexerError::Other(format!("transfer id {} does not fit a token", id)))
}

fn wait_kind(events: &SocketEvents) -> WaitKind {
    if events.remove() {
        WaitKind::Removed
    } else if events.input_and_output() {
        WaitKind::ReadWrite
    } else if events.input() {
        WaitKind::Read
    } else if events.output() {
        WaitKind::Write
    } else {
        WaitKind::Removed
    }
}

impl Multiplexer for CurlMultiplexer {
    fn install_notifiers(
        &mut self,
        sockets: SocketNotifier,
        timer: TimerNotifier,
    ) -> Result<(), MultiplexerError> {
        self.multi.socket_function(move |socket, events, _token| {
            sockets.notify(socket, wait_kind(&events));
        })?;
        self.multi.timer_function(move |timeout| {
            timer.notify(timeout);
            true
        })?;
        Ok(())
    }

    fn add_transfer(&mut self, id: TransferId, request: &Request) -> Result<(), MultiplexerError> {
        let token = token_for(id)?;
        let easy = self.build_easy(id, request)?;
        let mut handle = self.multi.add2(easy)?;
        // on error the handle drops here and detaches itself
        handle.set_token(token)?;
        self.handles.insert(id, handle);
        Ok(())
    }

    fn socket_action(&mut self, target: ActionTarget) -> Result<usize, MultiplexerError> {
        let running = match target {
            ActionTarget::Timeout => self.multi.timeout()?,
            ActionTarget::Socket { socket, kind } => {
                let mut events = Events::new();
                events.input(kind.wants_read()).output(kind.wants_write());
                self.multi.action(socket, &events)?
            }
        };
        Ok(running as usize)
    }

    fn drain_finished(&mut self) -> Vec<Finished> {
        let mut done = Vec::new();
        self.multi.messages(|message| match (message.token(), message.result()) {
            (Ok(token), Some(result)) => done.push((TransferId::new(token as u64), result)),
            (Err(e), _) => warn!(error = %e, "Finished message without token"),
            (Ok(_), None) => {}
        });

        let mut finished = Vec::with_capacity(done.len());
        for (id, result) in done {
            match self.handles.remove(&id) {
                Some(handle) => finished.push(self.finish(id, handle, result)),
                None => warn!(id = %id, "Finished message for unknown transfer"),
            }
        }
        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_matches_transfer_id() {
        assert_eq!(token_for(TransferId::new(42)).unwrap(), 42);
    }

    #[test]
    fn oversized_id_is_refused_on_narrow_targets() {
        let result = token_for(TransferId::new(u64::MAX));
        if usize::BITS < 64 {
            assert!(matches!(result, Err(MultiplexerError::Other(_))));
        } else {
            assert_eq!(result.unwrap(), usize::MAX);
        }
    }
}
