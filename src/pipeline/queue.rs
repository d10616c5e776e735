use super::{join_failure, produce, Produced, Tally};
use crate::error::Result;
use crate::source::CommitSource;
use crate::store::Aggregator;
use std::sync::{mpsc, Mutex};
use std::thread;

/// Bounded queue with one dedicated merger.
///
/// `workers` producers pull from a single listing behind a mutex, so each
/// commit is handed out once. The merger stops when every producer has
/// dropped its sender and the queue is empty, which is exactly when the
/// channel reports disconnection; there is no separate done flag to race with.
pub(super) fn run<S, A>(
    source: &S,
    listing: impl Iterator<Item = S::Handle> + Send,
    tally: Tally<A>,
    workers: usize,
    capacity: usize,
) -> Result<Tally<A>>
where
    S: CommitSource,
    A: Aggregator,
{
    let listing = Mutex::new(listing);
    let (tx, rx) = mpsc::sync_channel::<Produced>(capacity);

    thread::scope(|scope| {
        let merger = thread::Builder::new()
            .name("merger".to_string())
            .spawn_scoped(scope, move || {
                let mut tally = tally;
                for produced in rx {
                    tally.absorb(produced);
                }
                tally
            })?;

        for id in 0..workers {
            let tx = tx.clone();
            let listing = &listing;
            thread::Builder::new()
                .name(format!("producer-{id}"))
                .spawn_scoped(scope, move || loop {
                    let next = match listing.lock() {
                        Ok(mut handles) => handles.next(),
                        Err(_) => None,
                    };
                    let Some(handle) = next else { break };
                    if tx.send(produce(source, &handle)).is_err() {
                        break;
                    }
                })?;
        }
        drop(tx);

        merger.join().map_err(|_| join_failure("merger thread"))
    })
}
