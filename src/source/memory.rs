use super::{CommitSource, Handles};
use crate::error::{ContribError, Result};
use crate::model::RawCommit;
use std::collections::HashSet;
use std::time::Duration;

/// In-memory commit source with optional per-fetch latency and injected failures.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    commits: Vec<RawCommit>,
    fetch_delay: Option<Duration>,
    failing: HashSet<String>,
    break_listing_after: Option<usize>,
}

impl MemorySource {
    pub fn new(commits: Vec<RawCommit>) -> Self {
        Self {
            commits,
            ..Default::default()
        }
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    /// Fetching the commit with this sha fails.
    pub fn with_failing(mut self, sha: impl Into<String>) -> Self {
        self.failing.insert(sha.into());
        self
    }

    /// The listing yields `n` handles, then an error.
    pub fn with_broken_listing_after(mut self, n: usize) -> Self {
        self.break_listing_after = Some(n);
        self
    }
}

impl CommitSource for MemorySource {
    type Handle = usize;

    fn handles(&self) -> Result<Handles<'_, usize>> {
        let total = self.commits.len();
        match self.break_listing_after {
            Some(n) if n < total => Ok(Box::new((0..n).map(Ok).chain(std::iter::once(Err(
                ContribError::Source(format!("listing interrupted after {n} commits")),
            ))))),
            _ => Ok(Box::new((0..total).map(Ok))),
        }
    }

    fn fetch(&self, handle: &usize) -> Result<RawCommit> {
        if let Some(delay) = self.fetch_delay {
            std::thread::sleep(delay);
        }
        let commit = self
            .commits
            .get(*handle)
            .ok_or_else(|| ContribError::Source(format!("no commit at index {handle}")))?;
        if self.failing.contains(&commit.sha) {
            return Err(ContribError::Source(format!("fetch failed for {}", commit.sha)));
        }
        Ok(commit.clone())
    }

    fn describe(&self) -> String {
        format!("memory ({} commits)", self.commits.len())
    }
}
