//! Multiplexing request engine
//!
//! The engine owns a [`Multiplexer`] and two long-lived local tasks that pump
//! it:
//!
//! ```text
//!   multiplexer ──(socket notifier)──► event queue ──► I/O task
//!        ▲                                                │
//!        └──────────────── socket action ◄────────────────┘
//!        │
//!        └──► timeout task ──► harvester ──► PendingTransfer
//! ```
//!
//! Everything runs on one thread inside a [`tokio::task::LocalSet`]; tasks
//! interleave only at await points, and the multiplexer is never borrowed
//! across one.
//!
//! # Example
//!
//! ```ignore
//! use asyncurl::config::Config;
//! use asyncurl::engine::Engine;
//! use asyncurl::http::request::RequestBuilder;
//! use asyncurl::multi::CurlMultiplexer;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let cfg = Config::load()?;
//!     tokio::task::LocalSet::new()
//!         .run_until(async {
//!             let engine = Engine::new(&cfg.engine, CurlMultiplexer::new(&cfg.transfer))?;
//!             let request = RequestBuilder::new().url("http://example.com/").build()?;
//!             let completion = engine.submit(request)?.await;
//!             println!("{}", completion.summary().1);
//!             engine.shutdown().await;
//!             Ok(())
//!         })
//!         .await
//! }
//! ```

pub mod event;
mod harvest;
mod io;
pub mod notifier;
pub mod queue;
mod timer;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::EngineConfig;
use crate::engine::event::{ActionTarget, ReadinessEvent};
use crate::engine::notifier::{SocketNotifier, TimerNotifier};
use crate::engine::queue::EventQueue;
use crate::error::{EngineError, TransferError};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::multi::{CurlMultiplexer, Multiplexer, TransferId};

/// Final result of a submitted transfer.
#[derive(Debug, Clone)]
pub struct Completion {
    pub id: TransferId,
    pub url: Url,
    pub outcome: Result<Response, TransferError>,
}

impl Completion {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// `(ok, message)` pair: `"ok"` on success, the error text otherwise.
    pub fn summary(&self) -> (bool, String) {
        match &self.outcome {
            Ok(_) => (true, "ok".to_string()),
            Err(e) => (false, e.to_string()),
        }
    }
}

/// Handle to a submitted transfer; resolves to its [`Completion`].
///
/// Resolves with [`TransferError::EngineShutdown`] if the engine stops first.
#[derive(Debug)]
pub struct PendingTransfer {
    id: TransferId,
    url: Url,
    rx: oneshot::Receiver<Completion>,
}

impl PendingTransfer {
    pub fn id(&self) -> TransferId {
        self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Future for PendingTransfer {
    type Output = Completion;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(completion)) => Poll::Ready(completion),
            Poll::Ready(Err(_)) => Poll::Ready(Completion {
                id: self.id,
                url: self.url.clone(),
                outcome: Err(TransferError::EngineShutdown),
            }),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Counters describing an engine's activity so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    /// Readiness events lost to a full queue
    pub dropped_events: u64,
}

struct PendingEntry {
    url: Url,
    tx: oneshot::Sender<Completion>,
}

/// State shared by the engine handle and its two tasks.
pub(crate) struct Shared<M> {
    multiplexer: RefCell<Option<M>>,
    queue: Arc<Mutex<EventQueue>>,
    io_wake: Arc<Notify>,
    timer: TimerNotifier,
    need_work: Cell<bool>,
    still_running: Cell<usize>,
    pending: RefCell<HashMap<TransferId, PendingEntry>>,
    stats: Cell<EngineStats>,
    io_wait: Duration,
    tick: Duration,
}

impl<M: Multiplexer> Shared<M> {
    fn is_live(&self) -> bool {
        self.need_work.get()
    }

    fn pop_event(&self) -> Option<ReadinessEvent> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
    }

    /// Run one socket action and record the running count it reports.
    ///
    /// Errors are logged; the calling loop keeps going.
    fn socket_action(&self, target: ActionTarget) {
        let result = {
            let mut multiplexer = self.multiplexer.borrow_mut();
            let Some(multiplexer) = multiplexer.as_mut() else {
                return;
            };
            multiplexer.socket_action(target)
        };

        match result {
            Ok(running) => {
                let before = self.still_running.replace(running);
                if running < before {
                    // something finished, let the harvester run early
                    self.timer.kick();
                }
            }
            Err(e) => {
                warn!(?target, error = %e, "Socket action failed");
            }
        }
    }

    fn update_stats(&self, f: impl FnOnce(&mut EngineStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

/// The long-lived request engine.
///
/// Must be created inside a [`tokio::task::LocalSet`]. Several engines can
/// coexist; each owns its own multiplexer and tasks.
pub struct Engine<M: Multiplexer = CurlMultiplexer> {
    shared: Rc<Shared<M>>,
    io_task: RefCell<Option<JoinHandle<()>>>,
    timer_task: RefCell<Option<JoinHandle<()>>>,
    next_id: Cell<u64>,
    stopped: Cell<bool>,
}

impl<M: Multiplexer> Engine<M> {
    /// Wire `multiplexer` to a fresh event queue and start the I/O and
    /// timeout tasks.
    ///
    /// On failure the multiplexer and anything else created so far are
    /// released before the error is returned.
    ///
    /// # Panics
    ///
    /// Panics if called on a runtime thread outside a `LocalSet`, as
    /// [`tokio::task::spawn_local`] does. Without any runtime the call
    /// returns [`EngineError::Construction`] instead.
    pub fn new(config: &EngineConfig, mut multiplexer: M) -> Result<Self, EngineError> {
        config
            .validate()
            .map_err(|e| EngineError::Construction(e.to_string()))?;

        tokio::runtime::Handle::try_current()
            .map_err(|e| EngineError::Construction(format!("no tokio runtime: {e}")))?;

        let queue = Arc::new(Mutex::new(EventQueue::new(
            config.queue_capacity,
            config.queue_order,
        )));
        let io_wake = Arc::new(Notify::new());
        let timer = TimerNotifier::new();

        // dropping `multiplexer` on this path is the rollback
        multiplexer
            .install_notifiers(SocketNotifier::new(queue.clone(), io_wake.clone()), timer.clone())
            .map_err(|e| EngineError::Construction(format!("cannot install notifiers: {e}")))?;

        let shared = Rc::new(Shared {
            multiplexer: RefCell::new(Some(multiplexer)),
            queue,
            io_wake,
            timer,
            need_work: Cell::new(true),
            still_running: Cell::new(0),
            pending: RefCell::new(HashMap::new()),
            stats: Cell::new(EngineStats::default()),
            io_wait: config.io_wait(),
            tick: config.tick(),
        });

        let timer_task = tokio::task::spawn_local(timer::run(shared.clone()));
        let io_task = tokio::task::spawn_local(io::run(shared.clone()));

        info!(
            queue_capacity = config.queue_capacity,
            queue_order = ?config.queue_order,
            io_wait_ms = config.io_wait_ms,
            tick_ms = config.tick_ms,
            "Engine started"
        );

        Ok(Self {
            shared,
            io_task: RefCell::new(Some(io_task)),
            timer_task: RefCell::new(Some(timer_task)),
            next_id: Cell::new(1),
            stopped: Cell::new(false),
        })
    }

    /// Register a new transfer and return a handle to its completion.
    ///
    /// Never blocks. The multiplexer schedules an immediate timeout for a new
    /// transfer, which the timeout task turns into its first socket action.
    pub fn submit(&self, request: Request) -> Result<PendingTransfer, EngineError> {
        if !self.shared.is_live() {
            return Err(EngineError::ShutDown);
        }

        let id = TransferId::new(self.next_id.get());

        {
            let mut multiplexer = self.shared.multiplexer.borrow_mut();
            let multiplexer = multiplexer.as_mut().ok_or(EngineError::ShutDown)?;
            multiplexer.add_transfer(id, &request)?;
        }
        self.next_id.set(id.as_u64() + 1);

        let (tx, rx) = oneshot::channel();
        self.shared.pending.borrow_mut().insert(
            id,
            PendingEntry {
                url: request.url.clone(),
                tx,
            },
        );
        self.shared
            .still_running
            .set(self.shared.still_running.get() + 1);
        self.shared.update_stats(|s| s.submitted += 1);
        self.shared.timer.kick();

        debug!(
            id = %id,
            method = ?request.method,
            url = %request.url,
            "Transfer submitted"
        );

        Ok(PendingTransfer {
            id,
            url: request.url,
            rx,
        })
    }

    /// Stop both tasks, then release the multiplexer.
    ///
    /// Transfers still in flight resolve with
    /// [`TransferError::EngineShutdown`]. Calling this again is a no-op.
    pub async fn shutdown(&self) {
        if self.stopped.replace(true) {
            return;
        }
        self.shared.need_work.set(false);

        // the timeout task drives completions, stop it first
        let timer_task = self.timer_task.borrow_mut().take();
        if let Some(task) = timer_task {
            stop_task("timeout", task).await;
        }
        let io_task = self.io_task.borrow_mut().take();
        if let Some(task) = io_task {
            stop_task("io", task).await;
        }

        let released = self.shared.multiplexer.borrow_mut().take();
        drop(released);

        let abandoned = self.shared.pending.borrow_mut().drain().count();
        self.shared.still_running.set(0);

        info!(abandoned, "Engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_live()
    }

    /// Running-transfer count as last reported by the multiplexer, plus
    /// submissions it has not reported on yet.
    pub fn still_running(&self) -> usize {
        self.shared.still_running.get()
    }

    /// Submitted transfers whose completion has not been delivered.
    pub fn in_flight(&self) -> usize {
        self.shared.pending.borrow().len()
    }

    /// Readiness events currently waiting for the I/O task.
    pub fn queued_events(&self) -> usize {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn stats(&self) -> EngineStats {
        let mut stats = self.shared.stats.get();
        stats.dropped_events = self
            .shared
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .dropped();
        stats
    }
}

impl<M: Multiplexer> Drop for Engine<M> {
    fn drop(&mut self) {
        self.shared.need_work.set(false);
        // the multiplexer goes away with the last task future holding it
        if let Some(task) = self.timer_task.get_mut().take() {
            task.abort();
        }
        if let Some(task) = self.io_task.get_mut().take() {
            task.abort();
        }
    }
}

async fn stop_task(name: &'static str, task: JoinHandle<()>) {
    task.abort();
    match task.await {
        Ok(()) => debug!(task = name, "Task finished"),
        Err(e) if e.is_cancelled() => debug!(task = name, "Task cancelled"),
        Err(e) => error!(task = name, error = %e, "Task panicked"),
    }
}
