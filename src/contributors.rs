use crate::cli::CommonArgs;
use crate::pipeline::{Pipeline, RunSummary};
use crate::report::{output_json, output_ndjson, output_table};
use crate::source::CommitSource;
use anyhow::Context;
use std::sync::Arc;

pub fn exec(common: CommonArgs, json: bool, ndjson: bool, top: Option<usize>) -> anyhow::Result<()> {
    // Keep stdout clean for machine-readable output
    let pipeline = Pipeline::new(common.pipeline_config(!json && !ndjson));

    let (repository, summary) = match common.open_local().context("Failed to open git repository")? {
        Some(local) => aggregate(&pipeline, local)?,
        None => {
            let remote = common.connect().context("Failed to reach the commit source")?;
            aggregate(&pipeline, remote)?
        }
    };

    if json {
        output_json(&summary, &repository, top)?;
    } else if ndjson {
        output_ndjson(&summary, top)?;
    } else {
        output_table(&summary, &repository, top)?;
    }

    Ok(())
}

fn aggregate<S: CommitSource + 'static>(pipeline: &Pipeline, source: S) -> anyhow::Result<(String, RunSummary)> {
    let repository = source.describe();
    let summary = pipeline
        .run(Arc::new(source))
        .context("Failed to aggregate commit history")?;
    Ok((repository, summary))
}
