use super::{produce, Produced, Tally};
use crate::error::{ContribError, Result};
use crate::source::CommitSource;
use crate::store::Aggregator;
use futures::stream::{self, StreamExt};
use std::pin::pin;
use std::sync::Arc;
use tokio::runtime::Builder;
use tokio::task::spawn_blocking;

/// Future per commit, collected in completion order by the calling thread.
///
/// At most `workers` fetches are in flight. There is no merger thread: the
/// collector loop is the only place that touches the aggregator, and it
/// turns failed tasks into discarded commits instead of aborting the run.
pub(super) fn run<S, A>(
    source: &Arc<S>,
    listing: impl Iterator<Item = S::Handle> + Send,
    mut tally: Tally<A>,
    workers: usize,
) -> Result<Tally<A>>
where
    S: CommitSource + 'static,
    A: Aggregator,
{
    let runtime = Builder::new_multi_thread()
        .worker_threads(1)
        .max_blocking_threads(workers)
        .thread_name("fetch")
        .build()
        .map_err(|e| ContribError::Runtime(format!("failed to start runtime: {e}")))?;

    runtime.block_on(async {
        let mut completed = pin!(stream::iter(listing)
            .map(|handle| {
                let source = Arc::clone(source);
                spawn_blocking(move || produce(source.as_ref(), &handle))
            })
            .buffer_unordered(workers));

        while let Some(joined) = completed.next().await {
            match joined {
                Ok(produced) => tally.absorb(produced),
                Err(e) => {
                    tracing::warn!("fetch task did not complete: {e}");
                    tally.absorb(Produced::Failed);
                }
            }
        }
    });

    Ok(tally)
}
