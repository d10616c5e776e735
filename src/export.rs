use crate::cli::CommonArgs;
use crate::error::{ContribError, Result};
use crate::extract::extract;
use crate::model::{ExportEntry, ExportOutput, SCHEMA_VERSION};
use crate::source::CommitSource;
use anyhow::Context;
use chrono::Utc;
use console::style;
use rayon::prelude::*;
use std::collections::HashSet;

pub fn exec(common: CommonArgs, json: bool, ndjson: bool) -> anyhow::Result<()> {
    let (repository, entries) = match common.open_local().context("Failed to open git repository")? {
        Some(local) => (local.describe(), collect_records(&local, common.workers)?),
        None => {
            let remote = common.connect().context("Failed to reach the commit source")?;
            (remote.describe(), collect_records(&remote, common.workers)?)
        }
    };

    if json {
        output_json(&entries, &repository, &common)?;
    } else if ndjson {
        output_ndjson(&entries)?;
    } else {
        output_summary(&entries)?;
    }

    Ok(())
}

/// Fetch and extract every listed commit, keeping listing order.
///
/// Commits that fail to fetch or cannot be attributed are logged and left out;
/// a listing that breaks part way returns what was listed before the break.
pub fn collect_records<S: CommitSource>(source: &S, workers: usize) -> Result<Vec<ExportEntry>> {
    let mut handles = Vec::new();
    for item in source.handles()? {
        match item {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                tracing::warn!("commit listing interrupted, exporting {} commits: {e}", handles.len());
                break;
            }
        }
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|e| ContribError::Runtime(format!("failed to build worker pool: {e}")))?;

    let entries = pool.install(|| {
        handles
            .into_par_iter()
            .filter_map(|handle| {
                let raw = source
                    .fetch(&handle)
                    .map_err(|e| tracing::warn!("skipping commit that could not be fetched: {e}"))
                    .ok()?;
                let record = extract(&raw)
                    .map_err(|e| tracing::warn!("discarding commit: {e}"))
                    .ok()??;
                Some(ExportEntry {
                    sha: raw.sha,
                    timestamp: raw.timestamp,
                    record,
                })
            })
            .collect()
    });
    Ok(entries)
}

fn output_json(entries: &[ExportEntry], repository: &str, common: &CommonArgs) -> anyhow::Result<()> {
    let output = ExportOutput {
        version: SCHEMA_VERSION,
        generated_at: Utc::now(),
        repository: repository.to_string(),
        since: common.since.clone(),
        until: common.until.clone(),
        entries: entries.to_vec(),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn output_ndjson(entries: &[ExportEntry]) -> anyhow::Result<()> {
    for entry in entries {
        println!("{}", serde_json::to_string(entry)?);
    }
    Ok(())
}

fn output_summary(entries: &[ExportEntry]) -> anyhow::Result<()> {
    println!("{}", style("Export Summary").bold());
    println!("{}", "─".repeat(50));

    let total_added: u64 = entries.iter().map(|e| e.record.additions).sum();
    let total_deleted: u64 = entries.iter().map(|e| e.record.deletions).sum();
    let files: HashSet<&str> = entries
        .iter()
        .flat_map(|e| e.record.files.iter().map(String::as_str))
        .collect();
    let contributors: HashSet<&str> = entries.iter().map(|e| e.record.contributor_id.as_str()).collect();

    println!("Commits with file changes: {}", style(entries.len()).cyan());
    println!("Distinct files touched: {}", style(files.len()).cyan());
    println!("Total lines added: {}", style(total_added).green());
    println!("Total lines deleted: {}", style(total_deleted).red());
    println!("Contributors: {}", style(contributors.len()).yellow());

    let dated: Vec<_> = entries.iter().filter_map(|e| e.timestamp).collect();
    if let (Some(first), Some(last)) = (dated.iter().min(), dated.iter().max()) {
        println!(
            "Date range: {} to {}",
            style(first.format("%Y-%m-%d")).dim(),
            style(last.format("%Y-%m-%d")).dim()
        );
    }

    println!("\nUse --json or --ndjson flags to export the raw data.");
    Ok(())
}
