//! Per-contributor statistics (lines added, lines removed, distinct files
//! touched) over the full commit history of a repository.
//!
//! Commits come from a [`source::CommitSource`], are turned into
//! [`model::CommitRecord`]s by [`extract::extract`] on many threads at once,
//! and are merged into a single [`store::AggregateStore`] by the
//! [`pipeline::Pipeline`]. [`report::report`] orders the frozen result.

pub mod cli;
pub mod config;
pub mod contributors;
pub mod error;
pub mod export;
pub mod extract;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod source;
pub mod store;

pub use error::{ContribError, Result};
pub use pipeline::{Pipeline, PipelineConfig, RunSummary, Strategy};
