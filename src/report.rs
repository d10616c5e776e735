use crate::model::{AggregateEntry, ContributorOutput, ContributorsOutput, SCHEMA_VERSION};
use crate::pipeline::RunSummary;
use crate::store::FrozenAggregate;
use anyhow::Result;
use chrono::Utc;
use console::style;

/// Contributors ordered by distinct files touched, most first.
///
/// The sort is stable and keyed only on the file count, so contributors with
/// equal counts keep the aggregate's ascending id order.
pub fn report(aggregate: &FrozenAggregate) -> Vec<(&str, &AggregateEntry)> {
    let mut rows: Vec<_> = aggregate.iter().collect();
    rows.sort_by(|a, b| b.1.files_touched.len().cmp(&a.1.files_touched.len()));
    rows
}

fn rows(summary: &RunSummary, top: Option<usize>) -> Vec<ContributorOutput> {
    report(&summary.aggregate)
        .into_iter()
        .take(top.unwrap_or(usize::MAX))
        .map(|(id, entry)| ContributorOutput::new(id, entry))
        .collect()
}

pub fn build_output(summary: &RunSummary, repository: &str, top: Option<usize>) -> ContributorsOutput {
    ContributorsOutput {
        version: SCHEMA_VERSION,
        generated_at: Utc::now(),
        repository: repository.to_string(),
        strategy: summary.strategy.to_string(),
        workers: summary.workers,
        stats: summary.stats,
        interrupted: summary.interrupted.clone(),
        contributors: rows(summary, top),
    }
}

pub fn output_json(summary: &RunSummary, repository: &str, top: Option<usize>) -> Result<()> {
    let output = build_output(summary, repository, top);
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub fn output_ndjson(summary: &RunSummary, top: Option<usize>) -> Result<()> {
    for row in rows(summary, top) {
        println!("{}", serde_json::to_string(&row)?);
    }
    Ok(())
}

pub fn output_table(summary: &RunSummary, repository: &str, top: Option<usize>) -> Result<()> {
    let contributors = rows(summary, top);
    if contributors.is_empty() {
        println!("No contributions found");
        return Ok(());
    }

    println!("{}", style(format!("Contributors of {repository}")).bold());
    for c in &contributors {
        println!("{}", "*".repeat(50));
        println!("{}", style(&c.contributor).cyan().bold());
        let files: Vec<&str> = c.files.iter().map(String::as_str).collect();
        println!("files ({}): {}", files.len(), files.join(", "));
        println!("additions: {}", style(c.additions).green());
        println!("deletions: {}", style(c.deletions).red());
        println!("commits: {}", c.commits);
        println!("{}", "-".repeat(50));
        println!();
    }

    let total = summary.aggregate.len();
    if contributors.len() < total {
        println!("... and {} more contributors", total - contributors.len());
    }
    println!(
        "{} commits seen, {} merged, {} without file changes, {} unattributed, {} failed ({:.2}s, {} strategy, {} workers)",
        summary.stats.seen,
        summary.stats.merged,
        summary.stats.filtered,
        summary.stats.unresolved,
        summary.stats.failed,
        summary.elapsed.as_secs_f64(),
        summary.strategy,
        summary.workers,
    );
    if let Some(reason) = &summary.interrupted {
        println!("{} listing stopped early: {reason}", style("warning:").yellow().bold());
    }
    Ok(())
}
