use super::{join_failure, produce, Produced, Tally};
use crate::error::{ContribError, Result};
use crate::source::CommitSource;
use crate::store::Aggregator;
use rayon::iter::{ParallelBridge, ParallelIterator};
use std::sync::{mpsc, Condvar, Mutex, MutexGuard};
use std::thread;

/// Worker pool fan-out into an unbounded queue with a background merger.
///
/// The merger is running before the first producer starts. Completion is
/// decided by the [`DrainLedger`]: every enqueued item must be acknowledged
/// by the merger, and the producers must have finished, before the merger
/// is joined and its aggregate handed back.
pub(super) fn run<S, A>(
    source: &S,
    listing: impl Iterator<Item = S::Handle> + Send,
    tally: Tally<A>,
    workers: usize,
) -> Result<Tally<A>>
where
    S: CommitSource,
    A: Aggregator,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("producer-{i}"))
        .build()
        .map_err(|e| ContribError::Runtime(format!("failed to build worker pool: {e}")))?;
    let ledger = DrainLedger::new();
    let (tx, rx) = mpsc::channel::<Produced>();

    thread::scope(|scope| {
        let ledger = &ledger;
        let merger = thread::Builder::new()
            .name("merger".to_string())
            .spawn_scoped(scope, move || {
                let _alive = ledger.merger_guard();
                let mut tally = tally;
                for produced in rx {
                    tally.absorb(produced);
                    ledger.acknowledge();
                }
                tally
            })?;

        pool.install(|| {
            listing.par_bridge().for_each_with(tx, |tx, handle| {
                let produced = produce(source, &handle);
                ledger.enqueue();
                if tx.send(produced).is_err() {
                    ledger.acknowledge();
                }
            })
        });
        ledger.producers_finished();

        let pending = ledger.wait_drained();
        if pending > 0 {
            tracing::error!(pending, "merger stopped before draining the queue");
        }
        merger.join().map_err(|_| join_failure("merger thread"))
    })
}

#[derive(Debug, Default)]
struct LedgerState {
    pending: u64,
    producing: bool,
    merger_alive: bool,
}

/// Counts items put on the queue against items the merger has acknowledged.
#[derive(Debug)]
struct DrainLedger {
    state: Mutex<LedgerState>,
    drained: Condvar,
}

impl DrainLedger {
    fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState {
                pending: 0,
                producing: true,
                merger_alive: true,
            }),
            drained: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enqueue(&self) {
        self.lock().pending += 1;
    }

    fn acknowledge(&self) {
        let mut state = self.lock();
        state.pending = state.pending.saturating_sub(1);
        if state.pending == 0 {
            self.drained.notify_all();
        }
    }

    fn producers_finished(&self) {
        self.lock().producing = false;
        self.drained.notify_all();
    }

    /// Marks the merger as gone when dropped, including during a panic.
    fn merger_guard(&self) -> MergerGuard<'_> {
        MergerGuard(self)
    }

    /// Block until producers are done and nothing is pending, or the merger is gone.
    /// Returns the number of items still pending.
    fn wait_drained(&self) -> u64 {
        let mut state = self.lock();
        while (state.producing || state.pending > 0) && state.merger_alive {
            state = self
                .drained
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        state.pending
    }
}

struct MergerGuard<'a>(&'a DrainLedger);

impl Drop for MergerGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().merger_alive = false;
        self.0.drained.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn waits_for_every_acknowledgement() {
        let ledger = Arc::new(DrainLedger::new());
        for _ in 0..3 {
            ledger.enqueue();
        }
        ledger.producers_finished();

        let worker = {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                for _ in 0..3 {
                    thread::sleep(Duration::from_millis(10));
                    ledger.acknowledge();
                }
            })
        };

        assert_eq!(ledger.wait_drained(), 0);
        worker.join().unwrap();
    }

    #[test]
    fn does_not_hang_when_merger_dies() {
        let ledger = DrainLedger::new();
        ledger.enqueue();
        ledger.producers_finished();
        drop(ledger.merger_guard());
        assert_eq!(ledger.wait_drained(), 1);
    }
}
