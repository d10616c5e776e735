//! Concurrent fetch, extract and merge.
//!
//! Every strategy follows the same shape: producers call
//! [`CommitSource::fetch`] and [`extract`] in parallel, and exactly one merger
//! owns the [`Aggregator`] for the whole run. The aggregator is handed back
//! only once every listed commit has been merged or discarded, so a caller
//! can never observe a partially merged store.

mod fanout;
mod pool;
mod queue;
mod sequential;

use crate::error::{ContribError, Result};
use crate::extract::extract;
use crate::model::{CommitRecord, PipelineStats};
use crate::source::{CommitSource, Handles};
use crate::store::{AggregateStore, Aggregator, FrozenAggregate};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// One thread fetches, extracts and merges in listing order.
    Sequential,
    /// Producers share the listing and feed a bounded queue drained by one merger.
    #[value(name = "queue")]
    BoundedQueue,
    /// A fixed thread pool feeds an unbounded queue; the merger acknowledges every item.
    #[value(name = "pool")]
    WorkerPool,
    /// One blocking task per commit, merged by the caller in completion order.
    Futures,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Sequential,
        Strategy::BoundedQueue,
        Strategy::WorkerPool,
        Strategy::Futures,
    ];
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Sequential => "sequential",
            Strategy::BoundedQueue => "queue",
            Strategy::WorkerPool => "pool",
            Strategy::Futures => "futures",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub strategy: Strategy,
    pub workers: usize,
    pub queue_capacity: usize,
    pub progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::WorkerPool,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            progress: false,
        }
    }
}

impl PipelineConfig {
    pub fn new(strategy: Strategy, workers: usize) -> Self {
        Self {
            strategy,
            workers,
            ..Default::default()
        }
    }
}

/// The aggregator after the completion barrier, with the run's accounting.
#[derive(Debug)]
pub struct RunOutcome<A> {
    pub aggregator: A,
    pub stats: PipelineStats,
    /// Set when the commit listing failed part way; the aggregate covers what came before.
    pub interrupted: Option<String>,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct RunSummary {
    pub aggregate: FrozenAggregate,
    pub stats: PipelineStats,
    pub interrupted: Option<String>,
    pub strategy: Strategy,
    pub workers: usize,
    pub elapsed: Duration,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Aggregate the full history of `source` into a fresh [`AggregateStore`].
    pub fn run<S>(&self, source: Arc<S>) -> Result<RunSummary>
    where
        S: CommitSource + 'static,
    {
        let outcome = self.run_into(source, AggregateStore::new())?;
        Ok(RunSummary {
            aggregate: outcome.aggregator.freeze(),
            stats: outcome.stats,
            interrupted: outcome.interrupted,
            strategy: self.config.strategy,
            workers: self.workers(),
            elapsed: outcome.elapsed,
        })
    }

    /// Run the configured strategy, merging into `aggregator`.
    ///
    /// Fails only when the listing cannot be started at all; per-commit
    /// failures are counted and skipped.
    pub fn run_into<S, A>(&self, source: Arc<S>, aggregator: A) -> Result<RunOutcome<A>>
    where
        S: CommitSource + 'static,
        A: Aggregator,
    {
        let start = Instant::now();
        let workers = self.workers();
        let handles = source.handles()?;
        let interruption = Interruption::default();
        let tally = Tally::new(aggregator, self.progress_bar());

        tracing::info!(
            strategy = %self.config.strategy,
            workers,
            source = %source.describe(),
            "starting aggregation"
        );

        let listing = until_broken(handles, &interruption);
        let tally = match self.config.strategy {
            Strategy::Sequential => sequential::run(source.as_ref(), listing, tally),
            Strategy::BoundedQueue => {
                queue::run(source.as_ref(), listing, tally, workers, self.config.queue_capacity.max(1))?
            }
            Strategy::WorkerPool => pool::run(source.as_ref(), listing, tally, workers)?,
            Strategy::Futures => fanout::run(&source, listing, tally, workers)?,
        };

        let (aggregator, stats) = tally.finish();
        let interrupted = interruption.into_message();
        let elapsed = start.elapsed();

        debug_assert!(stats.is_balanced());
        if let Some(reason) = &interrupted {
            tracing::warn!("commit listing interrupted, aggregate is partial: {reason}");
        }
        tracing::info!(
            seen = stats.seen,
            merged = stats.merged,
            filtered = stats.filtered,
            unresolved = stats.unresolved,
            failed = stats.failed,
            elapsed_ms = elapsed.as_millis() as u64,
            "aggregation complete"
        );

        Ok(RunOutcome {
            aggregator,
            stats,
            interrupted,
            elapsed,
        })
    }

    fn workers(&self) -> usize {
        self.config.workers.max(1)
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.config.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {pos} commits {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("({} strategy)", self.config.strategy));
        pb
    }
}

/// What a producer made of one listed commit.
#[derive(Debug)]
pub(crate) enum Produced {
    Record(CommitRecord),
    Filtered,
    Unresolved,
    Failed,
}

pub(crate) fn produce<S: CommitSource>(source: &S, handle: &S::Handle) -> Produced {
    let raw = match source.fetch(handle) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!("skipping commit that could not be fetched: {e}");
            return Produced::Failed;
        }
    };
    match extract(&raw) {
        Ok(Some(record)) => Produced::Record(record),
        Ok(None) => {
            tracing::trace!(sha = %raw.sha, "no substantive file changes");
            Produced::Filtered
        }
        Err(e) => {
            tracing::warn!("discarding commit: {e}");
            Produced::Unresolved
        }
    }
}

/// Owned by the single merger. Applies records and keeps the run accounting.
pub(crate) struct Tally<A> {
    aggregator: A,
    stats: PipelineStats,
    progress: ProgressBar,
}

impl<A: Aggregator> Tally<A> {
    fn new(aggregator: A, progress: ProgressBar) -> Self {
        Self {
            aggregator,
            stats: PipelineStats::default(),
            progress,
        }
    }

    pub(crate) fn absorb(&mut self, produced: Produced) {
        self.stats.seen += 1;
        match produced {
            Produced::Record(record) => {
                self.aggregator.merge(record);
                self.stats.merged += 1;
            }
            Produced::Filtered => self.stats.filtered += 1,
            Produced::Unresolved => self.stats.unresolved += 1,
            Produced::Failed => self.stats.failed += 1,
        }
        self.progress.inc(1);
    }

    fn finish(self) -> (A, PipelineStats) {
        self.progress.finish_and_clear();
        (self.aggregator, self.stats)
    }
}

/// First listing failure of a run.
#[derive(Default)]
pub(crate) struct Interruption(OnceLock<String>);

impl Interruption {
    fn record(&self, err: ContribError) {
        tracing::error!("commit listing failed: {err}");
        let _ = self.0.set(err.to_string());
    }

    fn into_message(self) -> Option<String> {
        self.0.into_inner()
    }
}

/// Yield handles until the listing ends or breaks; a break is recorded, not returned.
fn until_broken<'a, H: 'a>(
    handles: Handles<'a, H>,
    interruption: &'a Interruption,
) -> impl Iterator<Item = H> + Send + 'a
where
    H: Send,
{
    handles.map_while(move |item| match item {
        Ok(handle) => Some(handle),
        Err(e) => {
            interruption.record(e);
            None
        }
    })
}

pub(crate) fn join_failure(what: &str) -> ContribError {
    ContribError::Runtime(format!("{what} panicked"))
}
