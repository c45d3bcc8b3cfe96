use tracing::{debug, warn};

use crate::engine::{Completion, Shared};
use crate::multi::{Finished, Multiplexer};

/// Drain every finished transfer and deliver its completion.
///
/// Returns the number of completions delivered or discarded.
pub(crate) fn harvest<M: Multiplexer>(shared: &Shared<M>) -> usize {
    let mut harvested = 0;

    loop {
        let finished = {
            let mut multiplexer = shared.multiplexer.borrow_mut();
            match multiplexer.as_mut() {
                Some(multiplexer) => multiplexer.drain_finished(),
                None => return harvested,
            }
        };
        if finished.is_empty() {
            break;
        }

        debug!(
            finished = finished.len(),
            remaining = shared.still_running.get(),
            "Harvesting transfers"
        );

        for done in finished {
            if deliver(shared, done) {
                harvested += 1;
            }
        }
    }

    harvested
}

fn deliver<M: Multiplexer>(shared: &Shared<M>, done: Finished) -> bool {
    let Finished { id, outcome } = done;

    let Some(entry) = shared.pending.borrow_mut().remove(&id) else {
        warn!(id = %id, "Completion for unknown transfer ignored");
        return false;
    };

    match &outcome {
        Ok(response) => debug!(id = %id, url = %entry.url, status = response.status, "Transfer done"),
        Err(e) => debug!(id = %id, url = %entry.url, error = %e, "Transfer failed"),
    }

    let failed = outcome.is_err();
    shared.update_stats(|s| {
        s.completed += 1;
        if failed {
            s.failed += 1;
        }
    });

    let completion = Completion {
        id,
        url: entry.url,
        outcome,
    };
    if entry.tx.send(completion).is_err() {
        debug!(id = %id, "Originator gone, completion discarded");
    }
    true
}
