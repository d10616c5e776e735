use crate::config::{resolve_range, Config};
use crate::error::{ContribError, Result};
use crate::model::DateRange;
use crate::pipeline::{PipelineConfig, Strategy, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};
use crate::source::{GitHubSource, LocalSource};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ghcontrib")]
#[command(about = "Per-contributor additions, deletions and files touched over a repository's history")]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone)]
pub struct CommonArgs {
    #[arg(long, env = "REPO", help = "Repository on the hosting API as owner/name")]
    pub repo: Option<String>,

    #[arg(long, env = "GIT_TOKEN", hide_env_values = true, help = "Access token for the hosting API")]
    pub token: Option<String>,

    #[arg(long, env = "GITHUB_API_URL", help = "Base URL of the hosting API")]
    pub api_url: Option<String>,

    #[arg(long, help = "Read history from a local git repository instead of the API")]
    pub local: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Strategy::WorkerPool, help = "Concurrency strategy")]
    pub strategy: Strategy,

    #[arg(long, default_value_t = DEFAULT_WORKERS, help = "Number of producer workers")]
    pub workers: usize,

    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY, help = "Queue capacity for the queue strategy")]
    pub queue_capacity: usize,

    #[arg(long, help = "Only commits after this date (RFC3339 or YYYY-MM-DD)")]
    pub since: Option<String>,

    #[arg(long, help = "Only commits before this date (RFC3339 or YYYY-MM-DD)")]
    pub until: Option<String>,

    #[arg(long, help = "Include merge commits from a local repository")]
    pub include_merges: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Aggregate statistics per contributor
    Contributors {
        #[arg(long, help = "Output as JSON")]
        json: bool,

        #[arg(long, help = "Output as NDJSON")]
        ndjson: bool,

        #[arg(long, help = "Show only the first N contributors")]
        top: Option<usize>,
    },
    /// Dump the extracted per-commit records, oldest first
    Export {
        #[arg(long, help = "Output as JSON")]
        json: bool,

        #[arg(long, help = "Output as NDJSON")]
        ndjson: bool,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn execute(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Contributors { json, ndjson, top } => {
                crate::contributors::exec(self.common, json, ndjson, top)
            }
            Commands::Export { json, ndjson } => crate::export::exec(self.common, json, ndjson),
        }
    }
}

impl CommonArgs {
    pub fn range(&self) -> Result<DateRange> {
        resolve_range(self.since.as_deref(), self.until.as_deref())
    }

    pub fn pipeline_config(&self, progress: bool) -> PipelineConfig {
        PipelineConfig {
            strategy: self.strategy,
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            progress,
        }
    }

    pub fn open_local(&self) -> Result<Option<LocalSource>> {
        self.local
            .as_ref()
            .map(|path| LocalSource::open(Some(path), self.range()?, self.include_merges))
            .transpose()
    }

    pub fn connect(&self) -> Result<GitHubSource> {
        let repo = self.repo.as_deref().ok_or_else(|| {
            ContribError::Config("no repository given; pass --repo owner/name, set REPO, or use --local".to_string())
        })?;
        let config = Config::new(repo, self.token.clone(), self.api_url.clone())?.with_range(self.range()?);
        GitHubSource::connect(&config)
    }
}
