use super::{produce, Tally};
use crate::source::CommitSource;
use crate::store::Aggregator;

/// Baseline: fetch, extract and merge one commit at a time in listing order.
pub(super) fn run<S, A>(source: &S, listing: impl Iterator<Item = S::Handle>, mut tally: Tally<A>) -> Tally<A>
where
    S: CommitSource,
    A: Aggregator,
{
    for handle in listing {
        tally.absorb(produce(source, &handle));
    }
    tally
}
