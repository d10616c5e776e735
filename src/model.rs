use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

pub const SCHEMA_VERSION: u32 = 1;

/// Per-file change counts as delivered by a commit source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFile {
    pub path: String,
    pub additions: u64,
    pub deletions: u64,
}

impl RawFile {
    pub fn new(path: impl Into<String>, additions: u64, deletions: u64) -> Self {
        Self {
            path: path.into(),
            additions,
            deletions,
        }
    }

    pub fn is_substantive(&self) -> bool {
        self.additions > 0 || self.deletions > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineStats {
    pub additions: u64,
    pub deletions: u64,
}

/// A commit exactly as a [`crate::source::CommitSource`] hands it over.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCommit {
    pub sha: String,
    pub login: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub stats: Option<LineStats>,
    pub files: Vec<RawFile>,
}

/// Outcome of resolving who a commit belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Login(String),
    Email(String),
    Unresolved,
}

/// The extracted contribution of one commit. Only built when `files` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub contributor_id: String,
    pub additions: u64,
    pub deletions: u64,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateEntry {
    pub additions_total: u64,
    pub deletions_total: u64,
    pub commits: u64,
    pub files_touched: HashSet<String>,
}

impl AggregateEntry {
    pub fn add_record(&mut self, record: &CommitRecord) {
        self.additions_total += record.additions;
        self.deletions_total += record.deletions;
        self.commits += 1;
        self.files_touched.extend(record.files.iter().cloned());
    }
}

/// Run-level accounting. Once a run completes, `seen == merged + filtered + unresolved + failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub seen: u64,
    pub merged: u64,
    pub filtered: u64,
    pub unresolved: u64,
    pub failed: u64,
}

impl PipelineStats {
    pub fn is_balanced(&self) -> bool {
        self.seen == self.merged + self.filtered + self.unresolved + self.failed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributorOutput {
    pub contributor: String,
    pub additions: u64,
    pub deletions: u64,
    pub commits: u64,
    pub files: BTreeSet<String>,
}

impl ContributorOutput {
    pub fn new(contributor: &str, entry: &AggregateEntry) -> Self {
        Self {
            contributor: contributor.to_string(),
            additions: entry.additions_total,
            deletions: entry.deletions_total,
            commits: entry.commits,
            files: entry.files_touched.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributorsOutput {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub repository: String,
    pub strategy: String,
    pub workers: usize,
    pub stats: PipelineStats,
    pub interrupted: Option<String>,
    pub contributors: Vec<ContributorOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportEntry {
    pub sha: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub record: CommitRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOutput {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub repository: String,
    pub since: Option<String>,
    pub until: Option<String>,
    pub entries: Vec<ExportEntry>,
}

#[derive(Debug, Clone)]
pub struct DateRange {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new() -> Self {
        Self { since: None, until: None }
    }

    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        if let Some(since) = self.since {
            if timestamp < &since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if timestamp > &until {
                return false;
            }
        }
        true
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self::new()
    }
}
