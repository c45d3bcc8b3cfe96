//! Timeout/completion task
//!
//! The only driver of the multiplexer's timer path and the only caller of the
//! harvester. Sleeps at most one tick between rounds and wakes early when
//! kicked by a submission or the I/O task, or when the multiplexer announces
//! a deadline that falls inside the current sleep.

use std::rc::Rc;

use crate::engine::event::ActionTarget;
use crate::engine::{harvest, Shared};
use crate::multi::Multiplexer;

pub(crate) async fn run<M: Multiplexer>(shared: Rc<Shared<M>>) {
    while shared.is_live() {
        shared.timer.begin_round();
        shared.socket_action(ActionTarget::Timeout);

        harvest::harvest(&shared);

        let nap = shared.timer.begin_nap(shared.tick);
        if nap.is_zero() {
            // an already due deadline still lets the I/O task in first
            tokio::task::yield_now().await;
            continue;
        }
        tokio::select! {
            _ = tokio::time::sleep(nap) => {}
            _ = shared.timer.kicked() => {}
        }
    }
}
