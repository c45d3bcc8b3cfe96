//! Callbacks handed to the multiplexer
//!
//! Both notifiers run from inside multiplexer calls. They only touch the
//! event queue and wake flags, never the multiplexer itself, and they are
//! `Send` because libcurl's callback registration requires it.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tracing::{trace, warn};

use crate::engine::event::{ReadinessEvent, Socket, WaitKind};
use crate::engine::queue::EventQueue;

/// Records socket interest changes and wakes the I/O task.
#[derive(Debug, Clone)]
pub struct SocketNotifier {
    queue: Arc<Mutex<EventQueue>>,
    wake: Arc<Notify>,
}

impl SocketNotifier {
    pub(crate) fn new(queue: Arc<Mutex<EventQueue>>, wake: Arc<Notify>) -> Self {
        Self { queue, wake }
    }

    /// Enqueue `kind` for `socket` and wake the I/O task.
    pub fn notify(&self, socket: Socket, kind: WaitKind) {
        let event = ReadinessEvent::new(socket, kind);
        let stored = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);

        if stored {
            trace!(socket, ?kind, "readiness event queued");
        } else {
            warn!(socket, ?kind, "Event queue full, readiness event dropped");
        }

        // Notify keeps a permit when the task is not waiting yet.
        self.wake.notify_one();
    }
}

#[derive(Debug, Default)]
struct TimerState {
    /// Next deadline announced by the multiplexer
    deadline: Option<Instant>,
    /// End of the timeout task's current sleep; `None` while it runs a round
    napping_until: Option<Instant>,
}

/// Receives the multiplexer's next internal deadline and wakes the timeout
/// task when that deadline falls inside its current sleep.
///
/// The multiplexer re-announces its deadline from within every action, the
/// timeout task's own ones included. Those announcements are only recorded;
/// the task reads them when it picks its next sleep.
#[derive(Debug, Clone)]
pub struct TimerNotifier {
    state: Arc<Mutex<TimerState>>,
    wake: Arc<Notify>,
}

impl TimerNotifier {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TimerState::default())),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Announce that the multiplexer wants its timer path run after
    /// `timeout`, or that no timer is pending (`None`).
    pub fn notify(&self, timeout: Option<Duration>) {
        let deadline = timeout.map(|after| Instant::now() + after);

        let wake = {
            let mut state = self.lock();
            state.deadline = deadline;
            matches!((state.napping_until, deadline), (Some(until), Some(at)) if at < until)
        };

        if wake {
            trace!(?timeout, "Earlier deadline, waking timeout task");
            self.wake.notify_one();
        }
    }

    /// Wake the timeout task without changing the deadline.
    pub fn kick(&self) {
        self.wake.notify_one();
    }

    /// Clear the recorded deadline at the start of a timeout round.
    ///
    /// A deadline announced during the round survives it.
    pub(crate) fn begin_round(&self) -> Option<Instant> {
        let mut state = self.lock();
        state.napping_until = None;
        state.deadline.take()
    }

    /// Pick the next sleep, at most `tick`, and record when it ends.
    pub(crate) fn begin_nap(&self, tick: Duration) -> Duration {
        let now = Instant::now();
        let mut state = self.lock();
        let nap = match state.deadline {
            Some(deadline) => deadline.saturating_duration_since(now).min(tick),
            None => tick,
        };
        state.napping_until = Some(now + nap);
        nap
    }

    pub(crate) async fn kicked(&self) {
        self.wake.notified().await;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
